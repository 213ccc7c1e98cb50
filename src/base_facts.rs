//! Base facts supplied by the engine every tick.
//!
//! The camera reports program placements in normalized coordinates (0..1 on
//! both axes). Base facts scale them to the viewport so rules work in pixels.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::claim::{Arg, Claim};
use crate::program::Program;
use crate::value::Value;

pub const CURRENT_TIME: &str = "current time is @";
pub const HAS_CORNER_POINTS: &str = "@ has corner points @";
pub const HAS_CENTER_POINT: &str = "@ has center point @";
pub const IS_A: &str = "@ is a @";
pub const IS_ON_SUPPORTER: &str = "@ is on supporter @";

/// Entity id of the surface every program lies on.
pub const TABLE: &str = "table";

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Component-wise product.
    #[must_use]
    pub fn scale(self, by: Self) -> Self {
        Self::new(self.x * by.x, self.y * by.y)
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Mean of `points`; the origin for an empty slice.
    #[must_use]
    pub fn average(points: &[Self]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let n = points.len() as f64;
        let sum = points
            .iter()
            .fold(Self::default(), |acc, p| Self::new(acc.x + p.x, acc.y + p.y));
        Self::new(sum.x / n, sum.y / n)
    }
}

/// The four corners of a rectangle-ish region, clockwise from top left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerPoints {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_right: Point,
    pub bottom_left: Point,
}

impl CornerPoints {
    /// Axis-aligned rectangle from the origin.
    #[must_use]
    pub const fn rect(width: f64, height: f64) -> Self {
        Self {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(width, 0.0),
            bottom_right: Point::new(width, height),
            bottom_left: Point::new(0.0, height),
        }
    }

    #[must_use]
    pub fn scale(self, by: Point) -> Self {
        Self {
            top_left: self.top_left.scale(by),
            top_right: self.top_right.scale(by),
            bottom_right: self.bottom_right.scale(by),
            bottom_left: self.bottom_left.scale(by),
        }
    }

    /// Mean length of the top and bottom edges.
    #[must_use]
    pub fn width(&self) -> f64 {
        (self.top_left.distance(self.top_right) + self.bottom_left.distance(self.bottom_right)) / 2.0
    }

    /// Mean length of the left and right edges.
    #[must_use]
    pub fn height(&self) -> f64 {
        (self.top_right.distance(self.bottom_right) + self.top_left.distance(self.bottom_left)) / 2.0
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point::average(&[self.top_left, self.top_right, self.bottom_right, self.bottom_left])
    }
}

/// Where the camera saw a program, in normalized coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub corners: CornerPoints,
    pub center: Point,
}

impl Placement {
    /// Placement whose center is the mean of its corners.
    #[must_use]
    pub fn from_corners(corners: CornerPoints) -> Self {
        Self {
            center: corners.center(),
            corners,
        }
    }
}

/// Size of the projection surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
        }
    }
}

impl Viewport {
    #[must_use]
    pub const fn as_point(&self) -> Point {
        Point::new(self.width, self.height)
    }
}

/// Produces the claims every tick starts from.
pub trait BaseFactSource: Send {
    /// Appends this tick's base claims for the running `programs`.
    fn base_facts(&self, programs: &[Program], out: &mut Vec<Claim>);
}

/// Default base facts: clock, table geometry and per-program placement.
#[derive(Debug, Clone, Default)]
pub struct CoreFacts {
    viewport: Viewport,
    fixed_time: Option<i64>,
}

impl CoreFacts {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            fixed_time: None,
        }
    }

    /// Pins `current time is @` to `millis` since the epoch.
    #[must_use]
    pub fn with_fixed_time(mut self, millis: i64) -> Self {
        self.fixed_time = Some(millis);
        self
    }

    fn now_millis(&self) -> i64 {
        self.fixed_time.unwrap_or_else(|| Utc::now().timestamp_millis())
    }
}

impl BaseFactSource for CoreFacts {
    fn base_facts(&self, programs: &[Program], out: &mut Vec<Claim>) {
        out.push(Claim::fact(CURRENT_TIME, [self.now_millis()]));

        let table = CornerPoints::rect(self.viewport.width, self.viewport.height);
        push_structured(out, HAS_CORNER_POINTS, TABLE, &table);

        let scale = self.viewport.as_point();
        for program in programs {
            let id = Value::from(&program.id);
            out.push(Claim::fact(IS_A, [id.clone(), Value::from("program")]));
            out.push(Claim::fact(IS_ON_SUPPORTER, [id, Value::from(TABLE)]));

            if let Some(placement) = &program.placement {
                push_structured(out, HAS_CORNER_POINTS, program.id.as_str(), &placement.corners.scale(scale));
                push_structured(out, HAS_CENTER_POINT, program.id.as_str(), &placement.center.scale(scale));
            }
        }
    }
}

fn push_structured<T: Serialize>(out: &mut Vec<Claim>, name: &str, entity: &str, payload: &T) {
    match Value::from_serialize(payload) {
        Ok(value) => out.push(Claim::new(name, vec![Arg::constant(entity), Arg::Constant(value)])),
        Err(err) => warn!(claim = name, entity, error = %err, "failed to encode base fact"),
    }
}
