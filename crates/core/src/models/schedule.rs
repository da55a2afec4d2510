use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{SchedulerError, SchedulerResult};
use crate::models::JobParams;

/// 调度表达式
///
/// 只支持一组固定的周期模式，而不是完整的CRON语法。每种模式都对应一个
/// 纯函数 `(now) -> next_run`，所有时间按UTC计算。
///
/// 支持的文本形式：
///
/// | 文本 | 含义 |
/// |---|---|
/// | `* * * * *` | 每分钟 |
/// | `*/N * * * *` | 每N分钟 |
/// | `0 * * * *` / `@hourly` | 每小时 |
/// | `0 */N * * *` | 每N小时 |
/// | `0 H * * *` / `@daily` | 每天H点 |
/// | `0 H * * D` / `@weekly` | 每周D(0-7，0和7为周日) H点 |
/// | `@every Nm` / `@every Nh` | 每N分钟 / 每N小时 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScheduleExpr {
    EveryMinutes(u32),
    EveryHours(u32),
    DailyAt { hour: u32 },
    WeeklyAt { weekday: Weekday, hour: u32 },
}

impl ScheduleExpr {
    pub fn every_minutes(n: u32) -> SchedulerResult<Self> {
        validate_interval(n, MAX_INTERVAL_MINUTES, || format!("every {n} minutes"))?;
        Ok(ScheduleExpr::EveryMinutes(n))
    }

    pub fn every_hours(n: u32) -> SchedulerResult<Self> {
        validate_interval(n, MAX_INTERVAL_HOURS, || format!("every {n} hours"))?;
        Ok(ScheduleExpr::EveryHours(n))
    }

    pub fn daily_at(hour: u32) -> SchedulerResult<Self> {
        validate_hour(hour, || format!("daily at {hour}"))?;
        Ok(ScheduleExpr::DailyAt { hour })
    }

    pub fn weekly_at(weekday: Weekday, hour: u32) -> SchedulerResult<Self> {
        validate_hour(hour, || format!("weekly on {weekday} at {hour}"))?;
        Ok(ScheduleExpr::WeeklyAt { weekday, hour })
    }

    /// 计算严格晚于 `now` 的下一次触发时间
    ///
    /// 超出可表示范围时饱和为 `DateTime::<Utc>::MAX_UTC`。
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next = match *self {
            ScheduleExpr::EveryMinutes(n) => now
                .checked_add_signed(Duration::minutes(i64::from(n)))
                .map(|t| truncate(t, 60)),
            ScheduleExpr::EveryHours(n) => now
                .checked_add_signed(Duration::hours(i64::from(n)))
                .map(|t| truncate(t, 3600)),
            ScheduleExpr::DailyAt { hour } => {
                let today = at_hour(now.date_naive(), hour);
                if today > now {
                    Some(today)
                } else {
                    now.date_naive()
                        .checked_add_days(Days::new(1))
                        .map(|day| at_hour(day, hour))
                }
            }
            ScheduleExpr::WeeklyAt { weekday, hour } => {
                let date = now.date_naive();
                (0..=7)
                    .filter_map(|offset| date.checked_add_days(Days::new(offset)))
                    .filter(|day| day.weekday() == weekday)
                    .map(|day| at_hour(day, hour))
                    .find(|candidate| *candidate > now)
            }
        };
        next.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// 从 `from` 开始依次列出接下来的 `count` 次触发时间
    pub fn upcoming(&self, from: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        let mut times = Vec::with_capacity(count);
        let mut cursor = from;
        for _ in 0..count {
            cursor = self.next_after(cursor);
            times.push(cursor);
        }
        times
    }
}

/// 最长间隔一年
const MAX_INTERVAL_MINUTES: u32 = 365 * 24 * 60;
const MAX_INTERVAL_HOURS: u32 = 365 * 24;

fn validate_interval(n: u32, max: u32, expr: impl FnOnce() -> String) -> SchedulerResult<()> {
    if n == 0 {
        return Err(SchedulerError::invalid_schedule(expr(), "间隔必须大于0"));
    }
    if n > max {
        return Err(SchedulerError::invalid_schedule(
            expr(),
            format!("间隔不能超过一年 ({max})"),
        ));
    }
    Ok(())
}

fn validate_hour(hour: u32, expr: impl FnOnce() -> String) -> SchedulerResult<()> {
    if hour > 23 {
        return Err(SchedulerError::invalid_schedule(expr(), "小时必须在0-23之间"));
    }
    Ok(())
}

fn truncate(t: DateTime<Utc>, step_seconds: i64) -> DateTime<Utc> {
    let secs = t.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(step_seconds), 0).unwrap_or(t)
}

fn at_hour(date: NaiveDate, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

fn parse_weekday(field: &str) -> Option<Weekday> {
    match field.parse::<u32>().ok()? {
        0 | 7 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

fn parse_step(field: &str, max: u32) -> Option<u32> {
    let n = field.strip_prefix("*/")?.parse::<u32>().ok()?;
    (1..=max).contains(&n).then_some(n)
}

fn parse_every(spec: &str) -> Option<ScheduleExpr> {
    let spec = spec.trim();
    if let Some(n) = spec.strip_suffix('m') {
        return n.parse().ok().and_then(|n| ScheduleExpr::every_minutes(n).ok());
    }
    if let Some(n) = spec.strip_suffix('h') {
        return n.parse().ok().and_then(|n| ScheduleExpr::every_hours(n).ok());
    }
    None
}

impl FromStr for ScheduleExpr {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expr = s.trim();
        let unsupported = || SchedulerError::invalid_schedule(expr, "不支持的调度模式");

        match expr {
            "@hourly" => return Ok(ScheduleExpr::EveryHours(1)),
            "@daily" => return Ok(ScheduleExpr::DailyAt { hour: 0 }),
            "@weekly" => {
                return Ok(ScheduleExpr::WeeklyAt {
                    weekday: Weekday::Sun,
                    hour: 0,
                })
            }
            _ => {}
        }
        if let Some(spec) = expr.strip_prefix("@every ") {
            return parse_every(spec).ok_or_else(unsupported);
        }

        let fields: Vec<&str> = expr.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(SchedulerError::invalid_schedule(expr, "需要5个字段"));
        };
        if *day != "*" || *month != "*" {
            return Err(unsupported());
        }

        match (*minute, *hour, *weekday) {
            ("*", "*", "*") => Ok(ScheduleExpr::EveryMinutes(1)),
            (m, "*", "*") if m.starts_with("*/") => parse_step(m, 59)
                .map(ScheduleExpr::EveryMinutes)
                .ok_or_else(unsupported),
            ("0", "*", "*") => Ok(ScheduleExpr::EveryHours(1)),
            ("0", h, "*") if h.starts_with("*/") => parse_step(h, 23)
                .map(ScheduleExpr::EveryHours)
                .ok_or_else(unsupported),
            ("0", h, "*") => {
                let hour = h.parse::<u32>().map_err(|_| unsupported())?;
                ScheduleExpr::daily_at(hour)
            }
            ("0", h, d) => {
                let hour = h.parse::<u32>().map_err(|_| unsupported())?;
                let weekday = parse_weekday(d).ok_or_else(unsupported)?;
                ScheduleExpr::weekly_at(weekday, hour)
            }
            _ => Err(unsupported()),
        }
    }
}

impl fmt::Display for ScheduleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleExpr::EveryMinutes(1) => write!(f, "* * * * *"),
            ScheduleExpr::EveryMinutes(n) if *n <= 59 => write!(f, "*/{n} * * * *"),
            ScheduleExpr::EveryMinutes(n) => write!(f, "@every {n}m"),
            ScheduleExpr::EveryHours(1) => write!(f, "0 * * * *"),
            ScheduleExpr::EveryHours(n) if *n <= 23 => write!(f, "0 */{n} * * *"),
            ScheduleExpr::EveryHours(n) => write!(f, "@every {n}h"),
            ScheduleExpr::DailyAt { hour } => write!(f, "0 {hour} * * *"),
            ScheduleExpr::WeeklyAt { weekday, hour } => {
                write!(f, "0 {hour} * * {}", weekday.num_days_from_sunday())
            }
        }
    }
}

impl TryFrom<String> for ScheduleExpr {
    type Error = SchedulerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleExpr> for String {
    fn from(expr: ScheduleExpr) -> Self {
        expr.to_string()
    }
}

/// 调度条目：把任务定义绑定到周期触发器上
///
/// `next_run` 和 `last_run` 只由调度循环在触发后修改。条目不会被删除，
/// 禁用（`enabled = false`）即为移除。
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleEntry {
    pub id: String,
    pub job_id: String,
    pub name: String,
    pub schedule: ScheduleExpr,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub enabled: bool,
    pub parameters: JobParams,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn new(
        job_id: impl Into<String>,
        name: impl Into<String>,
        schedule: ScheduleExpr,
        parameters: JobParams,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("sched_{}", Uuid::new_v4().simple()),
            job_id: job_id.into(),
            name: name.into(),
            schedule,
            next_run: schedule.next_after(now),
            last_run: None,
            enabled: true,
            parameters,
            created_at: now,
            updated_at: now,
        }
    }

    /// 已启用且到达触发时间
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && now >= self.next_run
    }

    /// 触发后推进：记录本次触发时间并从 `now` 重新计算下一次触发。
    /// 错过的多次触发不会补跑。
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(self.next_run);
        self.next_run = self.schedule.next_after(now);
        self.updated_at = now;
    }
}
