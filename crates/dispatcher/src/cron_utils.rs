use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;

use scriptd_core::{ScriptError, ScriptResult};

/// CRON表达式解析和调度工具
///
/// 同时接受标准的5字段表达式（分钟粒度）和 `cron` crate 的6/7字段秒级表达式。
///
/// 5字段表达式按 crontab 的星期编号解释（0 和 7 为周日，1 为周一），
/// 规范化时转换为 `cron` crate 的编号（1 为周日）。6/7字段表达式原样交给 `cron` crate。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    expression: String,
    schedule: Schedule,
}

impl CronScheduler {
    /// 创建新的CRON调度器
    pub fn new(cron_expr: &str) -> ScriptResult<Self> {
        let expression = Self::normalize_expression(cron_expr);
        let schedule = Schedule::from_str(&expression).map_err(|e| ScriptError::InvalidCron {
            expr: cron_expr.to_string(),
            message: e.to_string(),
        })?;

        if expression != cron_expr.trim() {
            debug!("CRON表达式已规范化: '{}' -> '{}'", cron_expr, expression);
        }
        Ok(Self {
            expression,
            schedule,
        })
    }

    /// 5字段表达式补齐秒字段并转换星期编号，其余原样返回
    ///
    /// 无法识别的星期字段保持不变，由 `cron` crate 报告错误。
    pub fn normalize_expression(cron_expr: &str) -> String {
        let mut fields: Vec<String> = cron_expr.split_whitespace().map(str::to_string).collect();
        if fields.len() != 5 {
            return fields.join(" ");
        }

        if let Some(weekdays) = crontab_weekdays(&fields[4]) {
            fields[4] = weekdays;
        }
        format!("0 {}", fields.join(" "))
    }

    /// 规范化后的表达式
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 获取下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 获取从指定时间开始的多个执行时间
    pub fn upcoming_times(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&from).take(count).collect()
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> ScriptResult<()> {
        Self::new(cron_expr).map(|_| ())
    }

    /// 计算下次执行时间距离现在的时长
    pub fn time_until_next_execution(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_execution_time(now).map(|next| next - now)
    }
}

/// 把 crontab 星期字段转换为 `cron` crate 的写法
///
/// 支持 `*`、`?`、单值、范围、步长、列表以及英文星期名。结果是显式的序号列表，
/// 例如 `5-7` 转换为 `1,6,7`（周日、周五、周六）。
fn crontab_weekdays(field: &str) -> Option<String> {
    if field == "*" || field == "?" {
        return Some(field.to_string());
    }

    let mut days = BTreeSet::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, step.parse::<usize>().ok().filter(|s| *s > 0)?),
            None => (item, 1),
        };
        let (start, end) = match range.split_once('-') {
            _ if range == "*" => (0, 6),
            Some((start, end)) => (crontab_weekday(start)?, crontab_weekday(end)?),
            // `1/2` 这样的写法从起点一直到周六
            None if step > 1 => {
                let start = crontab_weekday(range)?;
                (start, start.max(6))
            }
            None => {
                let day = crontab_weekday(range)?;
                (day, day)
            }
        };
        if start > end {
            return None;
        }
        days.extend((start..=end).step_by(step).map(|day| day % 7));
    }

    let ordinals: Vec<String> = days.iter().map(|day| (day + 1).to_string()).collect();
    Some(ordinals.join(","))
}

/// crontab 星期值：0-7 或英文名，周日为 0
fn crontab_weekday(token: &str) -> Option<u32> {
    if let Ok(day) = token.parse::<u32>() {
        return (day <= 7).then_some(day);
    }
    match token.to_ascii_lowercase().as_str() {
        "sun" | "sunday" => Some(0),
        "mon" | "monday" => Some(1),
        "tue" | "tues" | "tuesday" => Some(2),
        "wed" | "wednesday" => Some(3),
        "thu" | "thurs" | "thursday" => Some(4),
        "fri" | "friday" => Some(5),
        "sat" | "saturday" => Some(6),
        _ => None,
    }
}
