//! Built-in programs shipped with the engine.

use crate::base_facts::{CornerPoints, Point, HAS_CENTER_POINT, HAS_CORNER_POINTS, IS_A};
use crate::claim::{val, var, Claim};
use crate::error::{FactLogError, FactLogResult};
use crate::program::{Program, ProgramContext};
use crate::query::Match;
use crate::value::Value;

pub const GEOMETRY_ID: &str = "geometry";

pub const HAS_WIDTH: &str = "@ has width @";
pub const HAS_HEIGHT: &str = "@ has height @";

/// Real-world units with a conversion rule, as (plural, singular).
const UNITS: [(&str, &str); 2] = [("cm", "cm"), ("inches", "inch")];

/// Geometry rules: size and center from corner points, in projector pixels
/// and in each real-world unit, plus the pixels-per-unit ratio of programs
/// measured both ways.
#[must_use]
pub fn geometry() -> Program {
    let source = concat!("core geometry ", env!("CARGO_PKG_VERSION"));
    Program::new(GEOMETRY_ID, source, |ctx| {
        register_dimensions(ctx, HAS_CORNER_POINTS, HAS_WIDTH, HAS_HEIGHT, HAS_CENTER_POINT)?;

        for (unit, per) in UNITS {
            let corners = format!("{HAS_CORNER_POINTS} in {unit}");
            let width = format!("{HAS_WIDTH} {unit}");
            let height = format!("{HAS_HEIGHT} {unit}");
            let center = format!("{HAS_CENTER_POINT} in {unit}");
            register_dimensions(ctx, &corners, &width, &height, &center)?;
            register_ratio(ctx, &width, &height, &format!("@ has @ pixels per {per}"))?;
        }
        Ok(())
    })
}

fn register_dimensions(
    ctx: &mut ProgramContext<'_>,
    corners: &str,
    width: &str,
    height: &str,
    center: &str,
) -> FactLogResult<()> {
    let pattern = vec![Claim::new(corners, vec![var("object"), var("points")])];

    let (width, height) = (width.to_string(), height.to_string());
    ctx.when(pattern.clone(), move |ctx, m| {
        let (object, points) = object_and_points(m)?;
        ctx.claim(&width, [object.clone(), Value::Float(points.width())]);
        ctx.claim(&height, [object, Value::Float(points.height())]);
        Ok(())
    })?;

    let center = center.to_string();
    ctx.when(pattern, move |ctx, m| {
        let (object, points) = object_and_points(m)?;
        ctx.claim(&center, [object, Value::from_serialize(&points.center())?]);
        Ok(())
    })?;
    Ok(())
}

/// Pixels per unit, for programs only (the table has no real-world size).
fn register_ratio(ctx: &mut ProgramContext<'_>, width: &str, height: &str, ratio: &str) -> FactLogResult<()> {
    let patterns = vec![
        Claim::new(IS_A, vec![var("object"), val("program")]),
        Claim::new(HAS_WIDTH, vec![var("object"), var("width_pixels")]),
        Claim::new(HAS_HEIGHT, vec![var("object"), var("height_pixels")]),
        Claim::new(width, vec![var("object"), var("width_units")]),
        Claim::new(height, vec![var("object"), var("height_units")]),
    ];

    let ratio = ratio.to_string();
    ctx.when(patterns, move |ctx, m| {
        let object = m.require("object")?.clone();
        let per_unit = Point::new(
            number(m, "width_pixels")? / number(m, "width_units")?,
            number(m, "height_pixels")? / number(m, "height_units")?,
        );
        ctx.claim(&ratio, [object, Value::from_serialize(&per_unit)?]);
        Ok(())
    })?;
    Ok(())
}

fn object_and_points(m: &Match) -> FactLogResult<(Value, CornerPoints)> {
    let object = m.require("object")?.clone();
    let points = m
        .get_typed::<CornerPoints>("points")
        .ok_or_else(|| FactLogError::callback("'points' is not a set of corner points"))?;
    Ok((object, points))
}

fn number(m: &Match, name: &str) -> FactLogResult<f64> {
    m.require(name)?
        .as_float()
        .ok_or_else(|| FactLogError::callback(format!("'{name}' is not a number")))
}
