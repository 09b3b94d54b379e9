//! `Animation`, `Track`, `Time`, `Value` and `Key`.
//!
//! Each track drives one transform structure of the animated node. The
//! node's local transform is sampled at every key time of every track:
//! animated transforms are interpolated, the others keep their static value,
//! and the chain is multiplied in document order.

use super::grammar::{self, prop, ChildRule, FloatData, PropertySpec, PropertyType};
use super::transform::{self, TransformKind};
use super::Interpreter;
use crate::ast::{Document, StructureId};
use crate::error::ImportError;
use crate::identifier::Identifier;
use crate::math::Matrix4;
use crate::resource::{AnimationInstance, Resource};
use crate::scene::{NodeId, SceneGraph};
use std::collections::HashMap;

const ANIMATION_PROPERTIES: &[PropertySpec] = &[
    prop("clip", PropertyType::Unsigned),
    prop("begin", PropertyType::Float),
    prop("end", PropertyType::Float),
];

const TRACK_CHILDREN: &[ChildRule] = &[
    ChildRule::one(Identifier::Time),
    ChildRule::one(Identifier::Value),
];

const CURVE_PROPERTIES: &[PropertySpec] = &[prop("curve", PropertyType::String)];

const KEY_PROPERTIES: &[PropertySpec] = &[prop("kind", PropertyType::String)];

/// Key times of equal value closer than this are merged.
const TIME_EPSILON: f32 = 1.0e-6;

#[derive(Debug, Clone, PartialEq)]
enum TimeCurve {
    Linear,
    /// Per-key control times before (`minus`) and after (`plus`) each key.
    Bezier { minus: Vec<f32>, plus: Vec<f32> },
}

#[derive(Debug, Clone, PartialEq)]
enum ValueCurve {
    Constant,
    Linear,
    Bezier {
        minus: Vec<Vec<f32>>,
        plus: Vec<Vec<f32>>,
    },
    Tcb {
        tension: Vec<f32>,
        continuity: Vec<f32>,
        bias: Vec<f32>,
    },
}

/// One animated transform channel.
#[derive(Debug, Clone, PartialEq)]
struct Track {
    target: StructureId,
    kind: TransformKind,
    times: Vec<f32>,
    time_curve: TimeCurve,
    values: Vec<Vec<f32>>,
    value_curve: ValueCurve,
}

impl Track {
    /// Interpolated transform components at `time`.
    fn evaluate(&self, time: f32) -> Vec<f32> {
        let n = self.times.len();
        if n == 1 || time <= self.times[0] {
            return self.values[0].clone();
        }
        if time >= self.times[n - 1] {
            return self.values[n - 1].clone();
        }
        // times[i] <= time < times[i + 1]
        let i = self.times.partition_point(|&t| t <= time) - 1;
        let s = self.time_curve.parameter(&self.times, i, time);
        let (p0, p1) = (&self.values[i], &self.values[i + 1]);

        match &self.value_curve {
            ValueCurve::Constant => p0.clone(),
            ValueCurve::Linear => p0
                .iter()
                .zip(p1)
                .map(|(a, b)| a + (b - a) * s)
                .collect(),
            ValueCurve::Bezier { minus, plus } => (0..p0.len())
                .map(|c| bezier(p0[c], plus[i][c], minus[i + 1][c], p1[c], s))
                .collect(),
            ValueCurve::Tcb {
                tension,
                continuity,
                bias,
            } => {
                let before = &self.values[i.saturating_sub(1)];
                let after = &self.values[(i + 2).min(n - 1)];
                let (t0, c0, b0) = (tension[i], continuity[i], bias[i]);
                let (t1, c1, b1) = (tension[i + 1], continuity[i + 1], bias[i + 1]);
                let h00 = 2.0 * s * s * s - 3.0 * s * s + 1.0;
                let h10 = s * s * s - 2.0 * s * s + s;
                let h01 = -2.0 * s * s * s + 3.0 * s * s;
                let h11 = s * s * s - s * s;
                (0..p0.len())
                    .map(|c| {
                        let outgoing = (1.0 - t0) * (1.0 + c0) * (1.0 + b0) / 2.0 * (p0[c] - before[c])
                            + (1.0 - t0) * (1.0 - c0) * (1.0 - b0) / 2.0 * (p1[c] - p0[c]);
                        let incoming = (1.0 - t1) * (1.0 - c1) * (1.0 + b1) / 2.0 * (p1[c] - p0[c])
                            + (1.0 - t1) * (1.0 + c1) * (1.0 - b1) / 2.0 * (after[c] - p1[c]);
                        h00 * p0[c] + h10 * outgoing + h01 * p1[c] + h11 * incoming
                    })
                    .collect()
            }
        }
    }
}

impl TimeCurve {
    /// Curve parameter in `[0, 1]` of `time` within key segment `i`.
    fn parameter(&self, times: &[f32], i: usize, time: f32) -> f32 {
        let (t0, t1) = (times[i], times[i + 1]);
        match self {
            TimeCurve::Linear => (time - t0) / (t1 - t0),
            TimeCurve::Bezier { minus, plus } => {
                // The time curve is monotonic on a well-formed segment.
                let (mut low, mut high) = (0.0f32, 1.0f32);
                for _ in 0..32 {
                    let mid = 0.5 * (low + high);
                    if bezier(t0, plus[i], minus[i + 1], t1, mid) < time {
                        low = mid;
                    } else {
                        high = mid;
                    }
                }
                0.5 * (low + high)
            }
        }
    }
}

fn bezier(p0: f32, p1: f32, p2: f32, p3: f32, s: f32) -> f32 {
    let u = 1.0 - s;
    u * u * u * p0 + 3.0 * u * u * s * p1 + 3.0 * u * s * s * p2 + s * s * s * p3
}

impl<S: SceneGraph> Interpreter<'_, S> {
    /// Sample `animation` (a child of node structure `owner`) into an
    /// animation resource for `node`.
    pub(super) fn visit_animation(
        &mut self,
        owner: StructureId,
        node: NodeId,
        animation: StructureId,
    ) -> Result<(), ImportError> {
        let document = self.document;
        let metrics = self.context.metrics;
        grammar::check_properties(document, animation, ANIMATION_PROPERTIES)?;
        grammar::check_substructures(
            document,
            animation,
            &[ChildRule::at_least_one(Identifier::Track)],
        )?;
        let clip = grammar::unsigned_property(document, animation, "clip").unwrap_or(0);
        let clip = u32::try_from(clip)
            .map_err(|_| grammar::error(document, animation, format!("clip {} out of range", clip)))?;
        let begin = grammar::float_property(document, animation, "begin").map(|t| t * metrics.time);
        let end = grammar::float_property(document, animation, "end").map(|t| t * metrics.time);

        let mut tracks = HashMap::new();
        for track in document.children_of(animation, Identifier::Track) {
            let track = read_track(document, owner, track, metrics.time)?;
            if tracks.contains_key(&track.target) {
                return Err(grammar::error(
                    document,
                    animation,
                    "two tracks target the same transform".to_string(),
                ));
            }
            tracks.insert(track.target, track);
        }

        let mut times: Vec<f32> = tracks.values().flat_map(|t| t.times.iter().copied()).collect();
        if let Some(begin) = begin {
            times.retain(|&t| t >= begin);
            times.push(begin);
        }
        if let Some(end) = end {
            times.retain(|&t| t <= end);
            times.push(end);
        }
        times.sort_by(f32::total_cmp);
        times.dedup_by(|a, b| (*a - *b).abs() <= TIME_EPSILON);

        // Static matrices of the node's transform chain; tracks replace theirs.
        let mut chain = Vec::new();
        for &child in document.get(owner).children() {
            if !document.get(child).identifier().is_some_and(Identifier::is_transform) {
                continue;
            }
            let t = transform::read_transform(document, child)?;
            if t.object {
                continue;
            }
            chain.push((child, t.single_matrix(document, child, &metrics)?));
        }

        let transforms = times
            .iter()
            .map(|&time| {
                chain.iter().fold(Matrix4::IDENTITY, |acc, (id, matrix)| {
                    acc * match tracks.get(id) {
                        Some(track) => track.kind.matrix(&track.evaluate(time), &metrics),
                        None => *matrix,
                    }
                })
            })
            .collect();

        let name = format!("{}/animation{}", self.node_prefix(node), clip);
        let instance = AnimationInstance::new(node, clip, times, transforms);
        self.scene.set_resource(&name, Resource::Animation(instance));
        Ok(())
    }
}

/// `Track (target) { Time {..} Value {..} }`; the target must be a
/// non-object transform of `owner`.
fn read_track(
    document: &Document,
    owner: StructureId,
    id: StructureId,
    time_scale: f32,
) -> Result<Track, ImportError> {
    const PROPERTIES: &[PropertySpec] = &[prop("target", PropertyType::Reference)];
    grammar::check_properties(document, id, PROPERTIES)?;
    grammar::check_substructures(document, id, TRACK_CHILDREN)?;

    let reference = grammar::reference_property(document, id, "target").ok_or_else(|| {
        grammar::error(document, id, "missing required property 'target'".to_string())
    })?;
    let target = document
        .resolve(reference, id)
        .ok_or_else(|| ImportError::unresolved(Identifier::Track.as_str(), reference.to_string()))?;
    let structure = document.get(target);
    if structure.father != Some(owner) || !structure.identifier().is_some_and(Identifier::is_transform) {
        return Err(grammar::error(
            document,
            id,
            format!("target {} is not a transform of the animated node", reference),
        ));
    }
    let target_transform = transform::read_transform(document, target)?;
    if target_transform.object {
        return Err(grammar::error(
            document,
            id,
            format!("target {} is an object transform", reference),
        ));
    }
    let kind = target_transform.kind;

    let time = document
        .children_of(id, Identifier::Time)
        .next()
        .ok_or_else(|| grammar::error(document, id, "missing Time".to_string()))?;
    let value = document
        .children_of(id, Identifier::Value)
        .next()
        .ok_or_else(|| grammar::error(document, id, "missing Value".to_string()))?;

    let (times, time_curve) = read_time(document, time, time_scale)?;
    let (values, value_curve) = read_value(document, value, kind.components(), times.len())?;

    Ok(Track {
        target,
        kind,
        times,
        time_curve,
        values,
        value_curve,
    })
}

/// The `Key` children of a `Time` or `Value`, by `kind`.
fn read_keys<'a>(
    document: &Document,
    id: StructureId,
    allowed: &[&'a str],
) -> Result<HashMap<&'a str, FloatData>, ImportError> {
    grammar::check_substructures(document, id, &[ChildRule::at_least_one(Identifier::Key)])?;
    let mut keys = HashMap::new();
    for key in document.children_of(id, Identifier::Key) {
        grammar::check_properties(document, key, KEY_PROPERTIES)?;
        grammar::check_substructures(document, key, &[ChildRule::one_data()])?;
        let kind = grammar::string_property(document, key, "kind").unwrap_or("value");
        let Some(&kind) = allowed.iter().find(|&&k| k == kind) else {
            return Err(grammar::error(
                document,
                key,
                format!("key kind \"{}\" is not valid here", kind),
            ));
        };
        if keys.insert(kind, grammar::float_data(document, key)?).is_some() {
            return Err(grammar::error(
                document,
                id,
                format!("duplicate \"{}\" key", kind),
            ));
        }
    }
    Ok(keys)
}

fn take_key(
    document: &Document,
    id: StructureId,
    keys: &mut HashMap<&str, FloatData>,
    kind: &str,
) -> Result<FloatData, ImportError> {
    keys.remove(kind)
        .ok_or_else(|| grammar::error(document, id, format!("missing \"{}\" key", kind)))
}

fn read_time(
    document: &Document,
    id: StructureId,
    scale: f32,
) -> Result<(Vec<f32>, TimeCurve), ImportError> {
    grammar::check_properties(document, id, CURVE_PROPERTIES)?;
    let curve = grammar::string_property(document, id, "curve").unwrap_or("linear");
    let allowed: &[&str] = match curve {
        "linear" => &["value"],
        "bezier" => &["value", "-control", "+control"],
        _ => {
            return Err(grammar::error(
                document,
                id,
                format!("unknown time curve \"{}\"", curve),
            ))
        }
    };
    let mut keys = read_keys(document, id, allowed)?;
    let scaled = |data: FloatData| -> Vec<f32> { data.values.iter().map(|t| t * scale).collect() };

    let times = scaled(take_key(document, id, &mut keys, "value")?);
    if times.is_empty() {
        return Err(grammar::error(document, id, "no key times".to_string()));
    }
    if times.windows(2).any(|w| w[1] < w[0]) {
        return Err(grammar::error(
            document,
            id,
            "key times must not decrease".to_string(),
        ));
    }

    let curve = if curve == "bezier" {
        let minus = scaled(take_key(document, id, &mut keys, "-control")?);
        let plus = scaled(take_key(document, id, &mut keys, "+control")?);
        if minus.len() != times.len() || plus.len() != times.len() {
            return Err(grammar::error(
                document,
                id,
                format!("control keys must have {} entries", times.len()),
            ));
        }
        TimeCurve::Bezier { minus, plus }
    } else {
        TimeCurve::Linear
    };
    Ok((times, curve))
}

/// Split key data into one row of `components` floats per key.
fn key_rows(
    document: &Document,
    id: StructureId,
    data: &FloatData,
    components: usize,
    count: usize,
) -> Result<Vec<Vec<f32>>, ImportError> {
    if data.values.len() != components * count {
        return Err(grammar::error(
            document,
            id,
            format!(
                "expected {} keys of {} components, found {} values",
                count,
                components,
                data.values.len()
            ),
        ));
    }
    Ok(data.values.chunks(components).map(<[f32]>::to_vec).collect())
}

fn read_value(
    document: &Document,
    id: StructureId,
    components: usize,
    count: usize,
) -> Result<(Vec<Vec<f32>>, ValueCurve), ImportError> {
    grammar::check_properties(document, id, CURVE_PROPERTIES)?;
    let curve = grammar::string_property(document, id, "curve").unwrap_or("linear");
    let allowed: &[&str] = match curve {
        "constant" | "linear" => &["value"],
        "bezier" => &["value", "-control", "+control"],
        "tcb" => &["value", "tension", "continuity", "bias"],
        _ => {
            return Err(grammar::error(
                document,
                id,
                format!("unknown value curve \"{}\"", curve),
            ))
        }
    };
    let mut keys = read_keys(document, id, allowed)?;
    let values = key_rows(document, id, &take_key(document, id, &mut keys, "value")?, components, count)?;

    let curve = match curve {
        "constant" => ValueCurve::Constant,
        "bezier" => ValueCurve::Bezier {
            minus: key_rows(document, id, &take_key(document, id, &mut keys, "-control")?, components, count)?,
            plus: key_rows(document, id, &take_key(document, id, &mut keys, "+control")?, components, count)?,
        },
        "tcb" => {
            let mut scalars = |kind: &str| -> Result<Vec<f32>, ImportError> {
                let data = take_key(document, id, &mut keys, kind)?;
                Ok(key_rows(document, id, &data, 1, count)?.into_iter().flatten().collect())
            };
            ValueCurve::Tcb {
                tension: scalars("tension")?,
                continuity: scalars("continuity")?,
                bias: scalars("bias")?,
            }
        }
        _ => ValueCurve::Linear,
    };
    Ok((values, curve))
}
