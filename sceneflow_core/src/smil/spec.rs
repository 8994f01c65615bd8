// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Parsing of SMIL timing attribute values.
//!
//! Grammar of one `begin` / `end` list entry (entries are `;`-separated):
//!
//! ```text
//! offset      = ("+" | "-")? clock-value
//! event       = (id ".")? event-name (("+" | "-") clock-value)?
//! sync-base   = id "." ("begin" | "end") (("+" | "-") clock-value)?
//! repeat      = id ".repeat(" integer ")" (("+" | "-") clock-value)?
//! access-key  = "accessKey(" char ")" (("+" | "-") clock-value)?
//! indefinite  = "indefinite"
//! ```
//!
//! Clock values are `hh:mm:ss(.f)`, `mm:ss(.f)` or a number with an optional
//! `h`, `min`, `s` or `ms` suffix (bare numbers are seconds).

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::{Error, Result};
use crate::event::EventType;
use crate::node::NodeId;

/// Time value standing for "unbounded". Compares greater than every finite
/// time.
pub const INDEFINITE: f64 = f64::INFINITY;

/// One entry of a `begin` or `end` list.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeSpec {
    /// A scene time, in seconds.
    Offset(f64),
    /// Never resolves on its own; only explicit instance times apply.
    Indefinite,
    /// An event on another element (or, without an id, on the element's
    /// default event base).
    Event {
        /// Referenced element, by name or numeric id.
        id: Option<String>,
        /// Event type.
        event: EventType,
        /// Added to the event time.
        offset: f64,
    },
    /// The begin or end of another element's current interval.
    SyncBase {
        /// Referenced element.
        id: String,
        /// `true` for `id.end`, `false` for `id.begin`.
        end: bool,
        /// Added to the sync-base time.
        offset: f64,
    },
    /// A given repeat iteration of another element.
    Repeat {
        /// Referenced element.
        id: String,
        /// Iteration number.
        iteration: u32,
        /// Added to the repeat time.
        offset: f64,
    },
    /// A key press anywhere in the scene.
    AccessKey {
        /// The key.
        key: char,
        /// Added to the key press time.
        offset: f64,
    },
}

impl TimeSpec {
    /// Parses a `;`-separated list.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInterval`] naming the first malformed entry.
    pub fn parse_list(input: &str) -> Result<Vec<Self>> {
        input
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Parses a single entry.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInterval`] if `input` is malformed.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let bad = || Error::InvalidInterval(s.to_string());
        if s == "indefinite" {
            return Ok(Self::Indefinite);
        }
        if s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.')) {
            return parse_signed_clock(s).map(Self::Offset);
        }
        if let Some(rest) = s.strip_prefix("accessKey(") {
            let mut chars = rest.chars();
            let key = chars.next().ok_or_else(bad)?;
            let tail = chars.as_str().strip_prefix(')').ok_or_else(bad)?;
            return Ok(Self::AccessKey {
                key,
                offset: parse_offset(tail)?,
            });
        }

        let (base, tail) = split_offset(s);
        let offset = parse_offset(tail)?;
        let (id, name) = match base.split_once('.') {
            Some((id, name)) if !id.is_empty() => (Some(id.trim()), name.trim()),
            Some(_) => return Err(bad()),
            None => (None, base.trim()),
        };
        match (id, name) {
            (Some(id), "begin" | "end") => Ok(Self::SyncBase {
                id: id.into(),
                end: name == "end",
                offset,
            }),
            (Some(id), _) if name.starts_with("repeat(") => {
                let n = name
                    .strip_prefix("repeat(")
                    .and_then(|n| n.strip_suffix(')'))
                    .and_then(|n| n.trim().parse::<u32>().ok())
                    .ok_or_else(bad)?;
                Ok(Self::Repeat {
                    id: id.into(),
                    iteration: n,
                    offset,
                })
            }
            _ => {
                let event = EventType::from_name(name).ok_or_else(bad)?;
                Ok(Self::Event {
                    id: id.map(Into::into),
                    event,
                    offset,
                })
            }
        }
    }

    /// Whether this entry waits on something other than the clock.
    #[must_use]
    pub fn is_event_based(&self) -> bool {
        !matches!(self, Self::Offset(_) | Self::Indefinite)
    }
}

/// Splits `a.click+2s` into `("a.click", "+2s")`.
///
/// Ids may contain `-`, so only a sign after the `.` (or in an id-less event
/// name) starts the offset.
fn split_offset(s: &str) -> (&str, &str) {
    let search_from = s.find('.').map_or(0, |dot| dot + 1);
    match s[search_from..].find(['+', '-']) {
        Some(i) => s.split_at(search_from + i),
        None => (s, ""),
    }
}

fn parse_offset(tail: &str) -> Result<f64> {
    let tail = tail.trim();
    if tail.is_empty() {
        Ok(0.0)
    } else {
        parse_signed_clock(tail)
    }
}

fn parse_signed_clock(s: &str) -> Result<f64> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('-') {
        Ok(-parse_clock_value(rest)?)
    } else {
        parse_clock_value(s.strip_prefix('+').unwrap_or(s))
    }
}

/// Parses an unsigned SMIL clock value into seconds.
///
/// # Errors
///
/// [`Error::InvalidInterval`] if `input` is malformed or negative.
pub fn parse_clock_value(input: &str) -> Result<f64> {
    let s = input.trim();
    let bad = || Error::InvalidInterval(s.to_string());
    let number = |t: &str| -> Result<f64> {
        let t = t.trim();
        if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit() || b == b'.') {
            return Err(bad());
        }
        t.parse::<f64>().map_err(|_| bad())
    };

    if s.contains(':') {
        let parts: Vec<&str> = s.split(':').collect();
        let (h, m, sec) = match parts.as_slice() {
            [h, m, sec] => (number(h)?, number(m)?, number(sec)?),
            [m, sec] => (0.0, number(m)?, number(sec)?),
            _ => return Err(bad()),
        };
        if m >= 60.0 || sec >= 60.0 {
            return Err(bad());
        }
        return Ok(h * 3600.0 + m * 60.0 + sec);
    }

    let (digits, scale) = if let Some(v) = s.strip_suffix("ms") {
        (v, 0.001)
    } else if let Some(v) = s.strip_suffix("min") {
        (v, 60.0)
    } else if let Some(v) = s.strip_suffix('h') {
        (v, 3600.0)
    } else if let Some(v) = s.strip_suffix('s') {
        (v, 1.0)
    } else {
        (s, 1.0)
    };
    Ok(number(digits)? * scale)
}

/// `dur` attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SimpleDuration {
    /// Not specified: indefinite unless `end` bounds the interval.
    #[default]
    Unspecified,
    /// An explicit clock value.
    Value(f64),
    /// `indefinite`.
    Indefinite,
    /// `media`: the intrinsic media duration. Media is not modelled here, so
    /// this behaves like `indefinite`.
    Media,
}

impl SimpleDuration {
    /// Duration in seconds ([`INDEFINITE`] when unbounded).
    #[must_use]
    pub const fn seconds(self) -> f64 {
        match self {
            Self::Value(v) => v,
            Self::Unspecified | Self::Indefinite | Self::Media => INDEFINITE,
        }
    }
}

/// `fill` attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fill {
    /// Revert when the active duration ends.
    #[default]
    Remove,
    /// Hold the last value.
    Freeze,
}

/// `restart` attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Restart {
    /// A new begin cuts the current interval short.
    #[default]
    Always,
    /// Begins arriving while active are ignored.
    WhenNotActive,
    /// Only the first interval ever plays.
    Never,
}

/// The timing attributes of one element.
#[derive(Clone, Debug, PartialEq)]
pub struct TimingAttributes {
    /// `begin` list. Empty means `0s`.
    pub begin: Vec<TimeSpec>,
    /// `end` list.
    pub end: Vec<TimeSpec>,
    /// `dur`.
    pub dur: SimpleDuration,
    /// `repeatCount`; [`INDEFINITE`] for `indefinite`.
    pub repeat_count: Option<f64>,
    /// `repeatDur`; [`INDEFINITE`] for `indefinite`.
    pub repeat_dur: Option<f64>,
    /// `min`.
    pub min: f64,
    /// `max`.
    pub max: f64,
    /// `fill`.
    pub fill: Fill,
    /// `restart`.
    pub restart: Restart,
    /// Node removed from the scene when the first interval begins
    /// (`<discard>`).
    pub discard: Option<NodeId>,
}

impl Default for TimingAttributes {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingAttributes {
    /// Defaults: begin at 0, no `dur`, no repeat, `fill="remove"`,
    /// `restart="always"`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            begin: Vec::new(),
            end: Vec::new(),
            dur: SimpleDuration::Unspecified,
            repeat_count: None,
            repeat_dur: None,
            min: 0.0,
            max: INDEFINITE,
            fill: Fill::Remove,
            restart: Restart::Always,
            discard: None,
        }
    }

    /// Sets one attribute from its textual form, as a decoder would.
    ///
    /// Unknown attribute names are ignored and reported as `Ok(false)`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInterval`] for a malformed value; the attributes are
    /// left unchanged.
    pub fn set(&mut self, name: &str, value: &str) -> Result<bool> {
        let v = value.trim();
        let bad = || Error::InvalidInterval(alloc::format!("{name}=\"{v}\""));
        match name {
            "begin" => self.begin = TimeSpec::parse_list(v)?,
            "end" => self.end = TimeSpec::parse_list(v)?,
            "dur" => {
                self.dur = match v {
                    "indefinite" => SimpleDuration::Indefinite,
                    "media" => SimpleDuration::Media,
                    _ => SimpleDuration::Value(parse_clock_value(v)?),
                };
            }
            "repeatCount" => {
                self.repeat_count = Some(match v {
                    "indefinite" => INDEFINITE,
                    _ => v
                        .parse::<f64>()
                        .ok()
                        .filter(|n| *n > 0.0)
                        .ok_or_else(bad)?,
                });
            }
            "repeatDur" => {
                self.repeat_dur = Some(match v {
                    "indefinite" => INDEFINITE,
                    _ => parse_clock_value(v)?,
                });
            }
            "min" => {
                self.min = match v {
                    "media" => 0.0,
                    _ => parse_clock_value(v)?,
                };
            }
            "max" => {
                self.max = match v {
                    "indefinite" | "media" => INDEFINITE,
                    _ => parse_clock_value(v).ok().filter(|m| *m > 0.0).ok_or_else(bad)?,
                };
            }
            "fill" => {
                self.fill = match v {
                    "freeze" | "hold" => Fill::Freeze,
                    "remove" | "auto" | "default" => Fill::Remove,
                    _ => return Err(bad()),
                };
            }
            "restart" => {
                self.restart = match v {
                    "always" | "default" => Restart::Always,
                    "whenNotActive" => Restart::WhenNotActive,
                    "never" => Restart::Never,
                    _ => return Err(bad()),
                };
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Whether any begin entry waits on an event, sync base, repeat or key.
    #[must_use]
    pub fn has_event_begins(&self) -> bool {
        self.begin.iter().any(TimeSpec::is_event_based)
    }

    /// Checks that the combination of values is usable.
    pub(crate) fn validate(&self) -> Result<()> {
        if let SimpleDuration::Value(d) = self.dur {
            if d.is_nan() || d < 0.0 {
                return Err(Error::InvalidInterval(alloc::format!("dur={d}")));
            }
        }
        if self.repeat_count.is_some_and(|n| n.is_nan() || n <= 0.0) {
            return Err(Error::InvalidInterval("repeatCount must be positive".into()));
        }
        Ok(())
    }

    /// `(min, max)` with the SMIL rule that `min > max` disables both.
    pub(crate) fn min_max(&self) -> (f64, f64) {
        if self.min > self.max {
            (0.0, INDEFINITE)
        } else {
            (self.min, self.max)
        }
    }
}
