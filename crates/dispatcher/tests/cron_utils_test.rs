#[cfg(test)]
mod cron_utils_tests {
    use scriptd_core::ScriptError;
    use scriptd_dispatcher::cron_utils::*;

    use chrono::{Datelike, TimeZone, Timelike, Utc, Weekday};

    #[test]
    fn test_cron_scheduler_creation() {
        assert!(CronScheduler::new("0 0 0 * * *").is_ok());
        assert!(CronScheduler::new("* * * * *").is_ok());
        assert!(CronScheduler::new("0 0 0 * * * 2030").is_ok());

        let err = CronScheduler::new("invalid").unwrap_err();
        assert!(matches!(err, ScriptError::InvalidCron { expr, .. } if expr == "invalid"));
    }

    #[test]
    fn test_normalize_expression() {
        assert_eq!(CronScheduler::normalize_expression("* * * * *"), "0 * * * * *");
        assert_eq!(
            CronScheduler::normalize_expression("  */5   * * * * "),
            "0 */5 * * * *"
        );
        assert_eq!(
            CronScheduler::normalize_expression("*/2 * * * * *"),
            "*/2 * * * * *"
        );

        let scheduler = CronScheduler::new("30 2 * * *").unwrap();
        assert_eq!(scheduler.expression(), "0 30 2 * * *");
    }

    #[test]
    fn test_five_field_fires_every_minute() {
        let scheduler = CronScheduler::new("* * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        let upcoming = scheduler.upcoming_times(now, 2);

        assert_eq!(upcoming.len(), 2);
        assert_eq!(upcoming[0], Utc.with_ymd_and_hms(2024, 1, 1, 12, 1, 0).unwrap());
        assert_eq!(upcoming[1], Utc.with_ymd_and_hms(2024, 1, 1, 12, 2, 0).unwrap());
    }

    #[test]
    fn test_next_execution_time() {
        let scheduler = CronScheduler::new("0 0 0 * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next_time = scheduler.next_execution_time(now).unwrap();

        assert_eq!(next_time.hour(), 0);
        assert_eq!(next_time.minute(), 0);
        assert_eq!(next_time.second(), 0);
    }

    #[test]
    fn test_next_execution_is_strictly_after() {
        let scheduler = CronScheduler::new("* * * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let next = scheduler.next_execution_time(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 1).unwrap());
    }

    #[test]
    fn test_validate_cron_expression() {
        assert!(CronScheduler::validate_cron_expression("0 0 0 * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("*/5 * * * *").is_ok());
        assert!(CronScheduler::validate_cron_expression("0 0 9-17 * * 1-5").is_ok());
        assert!(CronScheduler::validate_cron_expression("invalid").is_err());
        assert!(CronScheduler::validate_cron_expression("0 0 0 32 * *").is_err());
        assert!(CronScheduler::validate_cron_expression("").is_err());
    }

    #[test]
    fn test_upcoming_times() {
        let scheduler = CronScheduler::new("0 * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let upcoming = scheduler.upcoming_times(now, 3);

        assert_eq!(upcoming.len(), 3);
        assert_eq!(upcoming[0].hour(), 13);
        assert_eq!(upcoming[1].hour(), 14);
        assert_eq!(upcoming[2].hour(), 15);
    }

    #[test]
    fn test_time_until_next_execution() {
        let scheduler = CronScheduler::new("0 0 * * * *").unwrap();

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();
        let duration = scheduler.time_until_next_execution(now).unwrap();

        assert_eq!(duration.num_minutes(), 30);
    }

    #[test]
    fn test_five_field_weekday_numbering() {
        // 2026-10-14 是周三
        let wednesday = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();

        let sunday = CronScheduler::new("0 0 * * 0").unwrap();
        let next = sunday.next_execution_time(wednesday).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 18, 0, 0, 0).unwrap());
        assert_eq!(next.weekday(), Weekday::Sun);

        let also_sunday = CronScheduler::new("0 0 * * 7").unwrap();
        assert_eq!(also_sunday.next_execution_time(wednesday), Some(next));

        let monday = CronScheduler::new("0 0 * * 1").unwrap();
        let next = monday.next_execution_time(wednesday).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap());
        assert_eq!(next.weekday(), Weekday::Mon);

        let named = CronScheduler::new("0 0 * * mon").unwrap();
        assert_eq!(named.next_execution_time(wednesday), Some(next));
    }

    #[test]
    fn test_five_field_weekday_ranges_and_lists() {
        let wednesday = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();

        let weekend = CronScheduler::new("0 0 * * 5-7").unwrap();
        let days: Vec<Weekday> = weekend
            .upcoming_times(wednesday, 4)
            .iter()
            .map(|t| t.weekday())
            .collect();
        assert_eq!(
            days,
            vec![Weekday::Fri, Weekday::Sat, Weekday::Sun, Weekday::Fri]
        );

        let workdays = CronScheduler::new("0 9 * * 1-5").unwrap();
        let friday = Utc.with_ymd_and_hms(2026, 10, 16, 10, 0, 0).unwrap();
        assert_eq!(
            workdays.next_execution_time(friday),
            Some(Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap())
        );

        let list = CronScheduler::new("0 0 * * 0,3").unwrap();
        let days: Vec<Weekday> = list
            .upcoming_times(wednesday, 3)
            .iter()
            .map(|t| t.weekday())
            .collect();
        assert_eq!(days, vec![Weekday::Sun, Weekday::Wed, Weekday::Sun]);

        assert_eq!(
            CronScheduler::normalize_expression("0 0 * * */2"),
            "0 0 0 * * 1,3,5,7"
        );
        assert!(CronScheduler::new("0 0 * * 8").is_err());
    }

    #[test]
    fn test_five_field_month_and_day() {
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap();

        let march_first = CronScheduler::new("30 6 1 3 *").unwrap();
        assert_eq!(
            march_first.next_execution_time(now),
            Some(Utc.with_ymd_and_hms(2027, 3, 1, 6, 30, 0).unwrap())
        );
    }
}
