//! Wall-clock triggers for period-based rotation.
//!
//! A [`RotatingFile`](crate::RotatingFile) configured with a rotate period
//! hands its rotation callback to a [`Scheduler`] together with a cron
//! expression. [`ThreadScheduler`] is the built-in implementation; anything
//! else implementing the trait can be plugged in through
//! [`Options::scheduler`](crate::Options::scheduler).

use crate::error::{Error, Result};
use chrono::{Datelike, Local, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use log::warn;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// Work run each time a schedule fires.
pub type Callback = Box<dyn Fn() + Send + Sync + 'static>;

/// Something that invokes a callback at the boundaries of a cron expression.
pub trait Scheduler: Send + Sync {
    /// Register `callback` to run whenever `expr` matches the wall clock.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::InvalidSchedule`] for expressions they
    /// do not understand.
    fn schedule(&self, expr: &str, callback: Callback) -> Result<()>;
}

// Leap days can be eight years apart across a century boundary.
const SEARCH_DAYS: u32 = 366 * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Any,
    At(u32),
}

impl Field {
    fn parse(expr: &str, raw: &str, min: u32, max: u32) -> Result<Self> {
        if raw == "*" {
            return Ok(Field::Any);
        }
        match raw.parse::<u32>() {
            Ok(v) if (min..=max).contains(&v) => Ok(Field::At(v)),
            _ => Err(Error::InvalidSchedule {
                expr: expr.to_string(),
                reason: "fields must be `*` or a number in range",
            }),
        }
    }

    fn matches(self, v: u32) -> bool {
        match self {
            Field::Any => true,
            Field::At(want) => want == v,
        }
    }
}

/// A five-field cron expression (`minute hour day-of-month month weekday`)
/// where every field is `*` or a single number.
///
/// Weekdays count from Sunday = 0; 7 is accepted as Sunday too. As in cron,
/// when both day-of-month and weekday are restricted a time matches if either
/// does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronExpr {
    minute: Field,
    hour: Field,
    day: Field,
    month: Field,
    weekday: Field,
}

impl FromStr for CronExpr {
    type Err = Error;

    fn from_str(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        let &[minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(Error::InvalidSchedule {
                expr: expr.to_string(),
                reason: "expected five fields",
            });
        };
        let weekday = match Field::parse(expr, weekday, 0, 7)? {
            Field::At(7) => Field::At(0),
            f => f,
        };
        Ok(CronExpr {
            minute: Field::parse(expr, minute, 0, 59)?,
            hour: Field::parse(expr, hour, 0, 23)?,
            day: Field::parse(expr, day, 1, 31)?,
            month: Field::parse(expr, month, 1, 12)?,
            weekday,
        })
    }
}

impl CronExpr {
    fn matches_date(&self, t: NaiveDateTime) -> bool {
        if !self.month.matches(t.month()) {
            return false;
        }
        let day = self.day.matches(t.day());
        let weekday = self.weekday.matches(t.weekday().num_days_from_sunday());
        match (self.day, self.weekday) {
            (Field::At(_), Field::At(_)) => day || weekday,
            _ => day && weekday,
        }
    }

    /// Whether `t`, taken at minute resolution, matches the expression.
    pub fn matches(&self, t: NaiveDateTime) -> bool {
        self.matches_date(t) && self.hour.matches(t.hour()) && self.minute.matches(t.minute())
    }

    /// The first whole minute strictly after `t` that matches, if any within
    /// the next eight years.
    pub fn next_after(&self, t: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut candidate = t.date().and_hms_opt(t.hour(), t.minute(), 0)? + TimeDelta::minutes(1);
        for _ in 0..SEARCH_DAYS {
            if self.matches_date(candidate) {
                let day = candidate.date();
                while candidate.date() == day {
                    if self.matches(candidate) {
                        return Some(candidate);
                    }
                    candidate += TimeDelta::minutes(1);
                }
            } else {
                candidate = candidate.date().succ_opt()?.and_time(NaiveTime::MIN);
            }
        }
        None
    }
}

/// Runs each scheduled callback on its own thread, in local time.
///
/// Dropping the scheduler stops and joins all of its threads.
#[derive(Default)]
pub struct ThreadScheduler {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for ThreadScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let jobs = self.handles.lock().map(|h| h.len()).unwrap_or_default();
        f.debug_struct("ThreadScheduler").field("jobs", &jobs).finish()
    }
}

impl ThreadScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule(&self, expr: &str, callback: Callback) -> Result<()> {
        let cron: CronExpr = expr.parse()?;
        let stop = Arc::clone(&self.stop);
        let handle = thread::Builder::new()
            .name("logrotate-schedule".to_string())
            .spawn(move || {
                loop {
                    let Some(next) = cron.next_after(Local::now().naive_local()) else {
                        warn!("schedule {cron:?} never fires again");
                        return;
                    };
                    if !sleep_until(&stop, next) {
                        return;
                    }
                    callback();
                }
            })?;
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        Ok(())
    }
}

/// Block until `deadline` in local time. Returns `false` if stopped first.
fn sleep_until(stop: &(Mutex<bool>, Condvar), deadline: NaiveDateTime) -> bool {
    let (lock, cvar) = stop;
    let mut stopped = lock.lock().unwrap_or_else(PoisonError::into_inner);
    loop {
        if *stopped {
            return false;
        }
        let remaining = match (deadline - Local::now().naive_local()).to_std() {
            Ok(d) if !d.is_zero() => d,
            _ => return true,
        };
        stopped = cvar
            .wait_timeout(stopped, remaining)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        let (lock, cvar) = &*self.stop;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();

        let current = thread::current().id();
        let handles = std::mem::take(self.handles.get_mut().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}
