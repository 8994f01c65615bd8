// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Attribute animation.
//!
//! An animation element is a timed node carrying an [`Animation`]: a
//! target `(node, field)` plus a key table or a [`Curve`]. Every animated
//! attribute owns a stack of the animations that target it, together with
//! its specified (non-animated) value. After the timing pass, the sandwich
//! pass composes each stack:
//!
//! ```text
//!   specified ──► anim 1 ──► anim 2 ──► ... ──► presentation value
//!                 (replace overwrites, sum adds to what is below)
//! ```
//!
//! Animations apply in begin-time order, ties broken by registration order.
//! Only active or frozen animations contribute. The presentation value is
//! written through the normal field-write path, so routes leaving the
//! attribute fire. Writes from outside the sandwich update the specified
//! value instead. When nothing contributes any more, the specified value is
//! written back.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::field::{FieldType, ValueKind};
use crate::graph::SceneGraph;
use crate::node::NodeId;
use crate::value::FieldValue;

pub mod curve;
pub mod interp;
pub mod keyframes;

pub use curve::{ControlPoint, Curve, Nurbs};
pub use interp::Interpolate;
pub use keyframes::{CalcMode, KeySpline, evaluate_keyframes};

/// `additive`: how an animation combines with the value below it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Additive {
    /// Overwrite.
    #[default]
    Replace,
    /// Add to.
    Sum,
}

/// `accumulate`: whether repeat cycles build on each other.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Accumulate {
    /// Each cycle starts over.
    #[default]
    None,
    /// Each cycle adds the final value of the previous ones.
    Sum,
}

/// Description of one attribute animation, as given by the host.
///
/// Value sources are read in SMIL priority: `values`, then `curve`, then
/// the `from` / `to` / `by` shorthands.
#[derive(Clone, Debug, PartialEq)]
pub struct Animation {
    /// Animated node.
    pub target: NodeId,
    /// Animated field of `target`.
    pub field: u32,
    /// `values` list.
    pub values: Vec<FieldValue>,
    /// Curve keys, instead of `values`.
    pub curve: Option<Curve>,
    /// `from`.
    pub from: Option<FieldValue>,
    /// `to`.
    pub to: Option<FieldValue>,
    /// `by`.
    pub by: Option<FieldValue>,
    /// `keyTimes`, one per value.
    pub key_times: Option<Vec<f64>>,
    /// `keySplines`, one per segment, for [`CalcMode::Spline`].
    pub key_splines: Vec<KeySpline>,
    /// `calcMode`.
    pub calc_mode: CalcMode,
    /// `additive`.
    pub additive: Additive,
    /// `accumulate`.
    pub accumulate: Accumulate,
}

impl Animation {
    /// A linear, replacing animation of `target.field` with no values yet.
    #[must_use]
    pub fn new(target: NodeId, field: u32) -> Self {
        Self {
            target,
            field,
            values: Vec::new(),
            curve: None,
            from: None,
            to: None,
            by: None,
            key_times: None,
            key_splines: Vec::new(),
            calc_mode: CalcMode::Linear,
            additive: Additive::Replace,
            accumulate: Accumulate::None,
        }
    }

    /// Sets the `values` list.
    #[must_use]
    pub fn with_values(mut self, values: Vec<FieldValue>) -> Self {
        self.values = values;
        self
    }

    /// Sets `from` and `to`.
    #[must_use]
    pub fn from_to(mut self, from: FieldValue, to: FieldValue) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }
}

/// Where sampled values come from.
#[derive(Clone, Debug, PartialEq)]
enum Keys {
    Values(Vec<FieldValue>),
    Curve(Curve),
    /// A to-animation: from whatever is below, to this value.
    To(FieldValue),
}

/// A validated [`Animation`], owned by its animation element.
#[derive(Clone, Debug)]
pub(crate) struct Animator {
    pub(crate) target: NodeId,
    pub(crate) field: u32,
    keys: Keys,
    key_times: Option<Vec<f64>>,
    key_splines: Vec<KeySpline>,
    calc_mode: CalcMode,
    additive: Additive,
    accumulate: Accumulate,
    /// Registration order, the tie-breaker within one begin time.
    order: u64,
}

impl Animator {
    fn sample_keys(&self, fraction: f64, underlying: &FieldValue) -> Option<FieldValue> {
        match &self.keys {
            Keys::Values(values) => evaluate_keyframes(
                values,
                self.key_times.as_deref(),
                &self.key_splines,
                self.calc_mode,
                fraction,
            ),
            Keys::Curve(curve) => curve.eval(fraction, self.calc_mode == CalcMode::Paced),
            Keys::To(to) => {
                let pair = [underlying.clone(), to.clone()];
                evaluate_keyframes(&pair, None, &[], self.calc_mode, fraction)
            }
        }
    }

    /// The value this animation contributes on top of `underlying`, or
    /// `None` if the keys cannot produce one.
    pub(crate) fn sample(
        &self,
        fraction: f64,
        cycle: u32,
        underlying: &FieldValue,
        ty: FieldType,
    ) -> Option<FieldValue> {
        let mut value = interp::coerce(self.sample_keys(fraction, underlying)?, ty)?;
        if self.accumulate == Accumulate::Sum && cycle > 0 {
            let last = interp::coerce(self.sample_keys(1.0, underlying)?, ty)?;
            value = value.sum(&last.scaled(f64::from(cycle))?)?;
        }
        if self.additive == Additive::Sum {
            value = underlying.sum(&value)?;
        }
        Some(value)
    }
}

/// The animations of one attribute and its specified value.
#[derive(Debug)]
pub(crate) struct AttributeStack {
    node: NodeId,
    field: u32,
    specified: FieldValue,
    /// Animation elements, in registration order.
    animators: Vec<NodeId>,
    /// Whether the field currently holds an animated value.
    applied: bool,
}

impl SceneGraph {
    /// Attaches `animation` to the animation element `element`, replacing
    /// its previous animation. The element animates while its timing (see
    /// [`set_timing`](Self::set_timing)) is active or frozen.
    ///
    /// `from`/`to` expands to a two-key table, `from`/`by` to
    /// `[from, from + by]`, a lone `by` to an additive `[0, by]`, and a lone
    /// `to` interpolates from the value below. Field types with no
    /// arithmetic always animate discretely.
    ///
    /// # Errors
    ///
    /// - [`Error::StaleNode`] for a stale element or target.
    /// - [`Error::FieldNotFound`] for a bad field index.
    /// - [`Error::TypeMismatch`] for a value or curve that does not fit the
    ///   field.
    /// - [`Error::InvalidCurve`] for an empty value source, bad `keyTimes`
    ///   or a `keySplines` count that does not match the segments.
    pub fn set_animation(&mut self, element: NodeId, animation: Animation) -> Result<()> {
        if !self.nodes.contains(element) {
            return Err(Error::StaleNode(element));
        }
        let ty = self.decl(animation.target, animation.field)?.ty;
        let fits = |v: &FieldValue| {
            interp::coerce(v.clone(), ty).ok_or(Error::TypeMismatch {
                from: v.field_type(),
                to: ty,
            })
        };

        let Animation {
            target,
            field,
            values,
            curve,
            from,
            to,
            by,
            key_times,
            key_splines,
            mut calc_mode,
            mut additive,
            accumulate,
        } = animation;

        let keys = if !values.is_empty() {
            Keys::Values(values.iter().map(fits).collect::<Result<_>>()?)
        } else if let Some(curve) = curve {
            let kind = curve.value_kind();
            let numeric = |k| matches!(k, ValueKind::Float | ValueKind::Double | ValueKind::Time);
            let ok = !ty.multi && (kind == ty.kind || (numeric(kind) && numeric(ty.kind)));
            if !ok {
                return Err(Error::TypeMismatch {
                    from: FieldType::single(kind),
                    to: ty,
                });
            }
            Keys::Curve(curve)
        } else {
            match (from, to, by) {
                (Some(from), Some(to), _) => Keys::Values(alloc::vec![fits(&from)?, fits(&to)?]),
                (Some(from), None, Some(by)) => {
                    let from = fits(&from)?;
                    let end = from.sum(&fits(&by)?).ok_or(Error::TypeMismatch {
                        from: by.field_type(),
                        to: ty,
                    })?;
                    Keys::Values(alloc::vec![from, end])
                }
                (None, None, Some(by)) => {
                    additive = Additive::Sum;
                    let by = fits(&by)?;
                    let zero = by.scaled(0.0).ok_or(Error::TypeMismatch {
                        from: by.field_type(),
                        to: ty,
                    })?;
                    Keys::Values(alloc::vec![zero, by])
                }
                (None, Some(to), _) => Keys::To(fits(&to)?),
                _ => return Err(Error::InvalidCurve("animation has no values")),
            }
        };

        if !ty.kind.is_interpolable() {
            calc_mode = CalcMode::Discrete;
        }
        let n = match &keys {
            Keys::Values(v) => v.len(),
            Keys::To(_) => 2,
            Keys::Curve(_) => 0,
        };
        if let (Some(times), Keys::Values(_)) = (&key_times, &keys) {
            check_key_times(times, n, calc_mode)?;
        }
        if calc_mode == CalcMode::Spline
            && !matches!(keys, Keys::Curve(_))
            && key_splines.len() + 1 != n
        {
            return Err(Error::InvalidCurve("keySplines needs one entry per segment"));
        }

        let order = self.next_animation_order;
        self.next_animation_order += 1;
        let animator = Animator {
            target,
            field,
            keys,
            key_times: key_times.filter(|_| calc_mode != CalcMode::Paced),
            key_splines,
            calc_mode,
            additive,
            accumulate,
            order,
        };
        if let Some(data) = self.nodes.get_mut(element) {
            data.animator = Some(animator);
        }
        let stack = self.stack_for(target, field, ty);
        stack.animators.retain(|&e| e != element);
        stack.animators.push(element);
        Ok(())
    }

    /// Detaches the animation of `element`. The attribute reverts at the
    /// next sandwich pass if nothing else animates it. Returns whether
    /// there was one.
    pub fn clear_animation(&mut self, element: NodeId) -> bool {
        self.nodes
            .get_mut(element)
            .and_then(|d| d.animator.take())
            .is_some()
    }

    /// The specified (non-animated) value of an animated attribute.
    #[must_use]
    pub fn specified_value(&self, node: NodeId, field: u32) -> Option<&FieldValue> {
        let &i = self.stack_index.get(&(node, field))?;
        self.stacks.get(i).map(|s| &s.specified)
    }

    /// Records an outside write to an animated attribute as its new
    /// specified value.
    pub(crate) fn note_specified_value(&mut self, node: NodeId, field: u32) {
        if self.in_sandwich {
            return;
        }
        let Some(&i) = self.stack_index.get(&(node, field)) else {
            return;
        };
        let Some(value) = self.nodes.get(node).and_then(|d| d.fields.get(field as usize)) else {
            return;
        };
        let value = value.clone();
        if let Some(stack) = self.stacks.get_mut(i) {
            stack.specified = value;
        }
    }

    fn stack_for(&mut self, node: NodeId, field: u32, ty: FieldType) -> &mut AttributeStack {
        let i = match self.stack_index.get(&(node, field)) {
            Some(&i) => i,
            None => {
                let specified = self
                    .nodes
                    .get(node)
                    .and_then(|d| d.fields.get(field as usize))
                    .cloned()
                    .unwrap_or_else(|| FieldValue::default_for(ty));
                self.stacks.push(AttributeStack {
                    node,
                    field,
                    specified,
                    animators: Vec::new(),
                    applied: false,
                });
                let i = self.stacks.len() - 1;
                self.stack_index.insert((node, field), i);
                i
            }
        };
        &mut self.stacks[i]
    }

    /// Composes every animated attribute and writes the presentation
    /// values. Returns how many attributes were written.
    pub(crate) fn run_sandwich(&mut self) -> u32 {
        let mut written = 0;
        let mut dropped = false;
        for i in 0..self.stacks.len() {
            let (node, field) = (self.stacks[i].node, self.stacks[i].field);
            if !self.nodes.contains(node) {
                self.stacks[i].animators.clear();
                self.stacks[i].applied = false;
                dropped = true;
                continue;
            }
            let layers = self.contributing_layers(i);
            let value = if layers.is_empty() {
                if !self.stacks[i].applied {
                    if self.stacks[i].animators.is_empty() {
                        dropped = true;
                    }
                    continue;
                }
                self.stacks[i].applied = false;
                Some(self.stacks[i].specified.clone())
            } else {
                self.stacks[i].applied = true;
                self.compose(i, &layers)
            };
            let Some(value) = value else {
                continue;
            };
            if self.nodes.get(node).and_then(|d| d.fields.get(field as usize)) == Some(&value) {
                continue;
            }
            self.in_sandwich = true;
            let res = self.set_field(node, field, value);
            self.in_sandwich = false;
            match res {
                Ok(()) => written += 1,
                Err(e) => log::debug!("animated write to {node:?}.{field} failed: {e}"),
            }
        }
        if dropped {
            self.prune_stacks();
        }
        self.stats.attributes_animated += written;
        written
    }

    /// Active or frozen animations of stack `i`, in sandwich order. Drops
    /// elements that are gone or animate something else now.
    fn contributing_layers(&mut self, i: usize) -> Vec<(NodeId, u32, f64)> {
        let (node, field) = (self.stacks[i].node, self.stacks[i].field);
        let nodes = &self.nodes;
        self.stacks[i].animators.retain(|&e| {
            nodes
                .get(e)
                .and_then(|d| d.animator.as_ref())
                .is_some_and(|a| a.target == node && a.field == field)
        });
        let mut layers: Vec<(f64, u64, NodeId, u32, f64)> = Vec::new();
        for &e in &self.stacks[i].animators {
            let Some(data) = self.nodes.get(e) else {
                continue;
            };
            let (Some(rt), Some(anim)) = (data.timing.as_deref(), data.animator.as_ref()) else {
                continue;
            };
            if !rt.is_contributing() {
                continue;
            }
            let state = rt.state();
            let begin = state.interval.map_or(0.0, |iv| iv.begin);
            layers.push((begin, anim.order, e, state.cycle, state.fraction));
        }
        layers.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        layers.into_iter().map(|(_, _, e, c, f)| (e, c, f)).collect()
    }

    fn compose(&self, i: usize, layers: &[(NodeId, u32, f64)]) -> Option<FieldValue> {
        let stack = &self.stacks[i];
        let ty = self.decl(stack.node, stack.field).ok()?.ty;
        let mut value = stack.specified.clone();
        for &(e, cycle, fraction) in layers {
            let Some(anim) = self.nodes.get(e).and_then(|d| d.animator.as_ref()) else {
                continue;
            };
            match anim.sample(fraction, cycle, &value, ty) {
                Some(v) => value = v,
                None => log::debug!("{e:?} produced no value; layer skipped"),
            }
        }
        Some(value)
    }

    fn prune_stacks(&mut self) {
        let nodes = &self.nodes;
        self.stacks
            .retain(|s| nodes.contains(s.node) && (!s.animators.is_empty() || s.applied));
        self.stack_index = self
            .stacks
            .iter()
            .enumerate()
            .map(|(i, s)| ((s.node, s.field), i))
            .collect::<HashMap<_, _>>();
    }
}

fn check_key_times(times: &[f64], n: usize, mode: CalcMode) -> Result<()> {
    if mode == CalcMode::Paced {
        return Ok(());
    }
    if times.len() != n {
        return Err(Error::InvalidCurve("keyTimes needs one entry per value"));
    }
    if times.first() != Some(&0.0) {
        return Err(Error::InvalidCurve("keyTimes must start at 0"));
    }
    if times.windows(2).any(|w| w[1] < w[0]) || times.iter().any(|t| !(0.0..=1.0).contains(t)) {
        return Err(Error::InvalidCurve("keyTimes must be non-decreasing in [0, 1]"));
    }
    if mode != CalcMode::Discrete && times.last() != Some(&1.0) {
        return Err(Error::InvalidCurve("keyTimes must end at 1"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    use super::*;
    use crate::clock::SceneClock;
    use crate::field::FieldDecl;
    use crate::kind::NodeTag;
    use crate::smil::{Fill, SimpleDuration, TimeSpec, TimingAttributes};

    struct Scene {
        g: SceneGraph,
        clock: Rc<RefCell<SceneClock>>,
        root: NodeId,
        target: NodeId,
    }

    impl Scene {
        fn new() -> Self {
            let mut g = SceneGraph::new();
            let shape = g.kinds_mut().register(
                "Shape",
                vec![
                    FieldDecl::exposed("size", FieldValue::Float(1.0)),
                    FieldDecl::exposed("visible", FieldValue::Bool(true)),
                ],
            );
            let root = g.new_node(NodeTag::GROUP).unwrap();
            g.register(root, None).unwrap();
            g.set_root(Some(root));
            let target = g.new_node(shape).unwrap();
            g.append_child(root, target).unwrap();
            let clock = Rc::new(RefCell::new(SceneClock::new()));
            g.set_time_source(Some(Box::new(clock.clone())));
            Self {
                g,
                clock,
                root,
                target,
            }
        }

        fn animate(&mut self, begin: f64, dur: f64, animation: Animation) -> Result<NodeId> {
            let a = self.g.new_node(NodeTag::ANIMATE).unwrap();
            self.g.append_child(self.root, a).unwrap();
            self.g.set_animation(a, animation)?;
            self.g
                .set_timing(
                    a,
                    TimingAttributes {
                        begin: vec![TimeSpec::Offset(begin)],
                        dur: SimpleDuration::Value(dur),
                        ..TimingAttributes::new()
                    },
                )
                .unwrap();
            Ok(a)
        }

        fn at(&mut self, t: f64) -> f32 {
            self.clock.borrow_mut().seek(t);
            self.g.advance();
            match self.g.field_value(self.target, 0) {
                Ok(FieldValue::Float(v)) => *v,
                other => panic!("size should be a float, got {other:?}"),
            }
        }
    }

    fn size_anim(target: NodeId, from: f32, to: f32) -> Animation {
        Animation::new(target, 0).from_to(FieldValue::Float(from), FieldValue::Float(to))
    }

    #[test]
    fn animates_then_restores_the_specified_value() {
        let mut s = Scene::new();
        s.animate(0.0, 2.0, size_anim(s.target, 0.0, 10.0)).unwrap();
        assert_eq!(s.at(1.0), 5.0);
        assert_eq!(s.at(1.5), 7.5);
        assert_eq!(s.at(3.0), 1.0, "back to the specified value");
    }

    #[test]
    fn echoed_presentation_value_is_not_a_new_specified_value() {
        let mut s = Scene::new();
        let mirror = s.g.new_node_by_name("Shape").unwrap();
        s.g.append_child(s.root, mirror).unwrap();
        s.g.create_route(s.target, 0, mirror, 0).unwrap();
        s.g.create_route(mirror, 0, s.target, 0).unwrap();
        s.animate(0.0, 2.0, size_anim(s.target, 0.0, 10.0)).unwrap();

        assert_eq!(s.at(1.0), 5.0);
        assert_eq!(s.g.field_value(mirror, 0), Ok(&FieldValue::Float(5.0)));
        assert_eq!(
            s.g.specified_value(s.target, 0),
            Some(&FieldValue::Float(1.0)),
            "the mirror only echoed the animated value"
        );
        assert_eq!(s.at(3.0), 1.0);
    }

    #[test]
    fn freeze_holds_the_last_value() {
        let mut s = Scene::new();
        let a = s.animate(0.0, 2.0, size_anim(s.target, 0.0, 10.0)).unwrap();
        let mut attrs = TimingAttributes {
            dur: SimpleDuration::Value(2.0),
            ..TimingAttributes::new()
        };
        attrs.fill = Fill::Freeze;
        s.g.set_timing(a, attrs).unwrap();
        s.at(1.0);
        assert_eq!(s.at(5.0), 10.0);
    }

    #[test]
    fn later_begins_sit_higher_in_the_sandwich() {
        let mut s = Scene::new();
        // Registered first but begins later, so it wins.
        s.animate(1.0, 10.0, size_anim(s.target, 50.0, 50.0)).unwrap();
        s.animate(0.0, 10.0, size_anim(s.target, 20.0, 20.0)).unwrap();
        assert_eq!(s.at(0.5), 20.0);
        assert_eq!(s.at(2.0), 50.0);
    }

    #[test]
    fn additive_layers_add_to_the_value_below() {
        let mut s = Scene::new();
        let mut add = size_anim(s.target, 0.0, 4.0);
        add.additive = Additive::Sum;
        s.animate(0.0, 4.0, add).unwrap();
        assert_eq!(s.at(2.0), 3.0, "specified 1 plus 2");
    }

    #[test]
    fn by_animation_is_additive() {
        let mut s = Scene::new();
        let mut by = Animation::new(s.target, 0);
        by.by = Some(FieldValue::Float(10.0));
        s.animate(0.0, 2.0, by).unwrap();
        assert_eq!(s.at(1.0), 6.0);
    }

    #[test]
    fn to_animation_starts_from_the_value_below() {
        let mut s = Scene::new();
        let mut to = Animation::new(s.target, 0);
        to.to = Some(FieldValue::Float(3.0));
        s.animate(0.0, 2.0, to).unwrap();
        assert_eq!(s.at(1.0), 2.0);
    }

    #[test]
    fn accumulate_builds_on_previous_cycles() {
        let mut s = Scene::new();
        let mut acc = size_anim(s.target, 0.0, 10.0);
        acc.accumulate = Accumulate::Sum;
        let a = s.animate(0.0, 1.0, acc).unwrap();
        let mut attrs = TimingAttributes {
            dur: SimpleDuration::Value(1.0),
            ..TimingAttributes::new()
        };
        attrs.repeat_count = Some(3.0);
        s.g.set_timing(a, attrs).unwrap();
        assert_eq!(s.at(0.5), 5.0);
        assert_eq!(s.at(2.5), 25.0);
    }

    #[test]
    fn outside_writes_change_the_specified_value() {
        let mut s = Scene::new();
        s.animate(0.0, 2.0, size_anim(s.target, 0.0, 10.0)).unwrap();
        s.at(1.0);
        s.g.set_field(s.target, 0, FieldValue::Float(42.0)).unwrap();
        assert_eq!(s.g.specified_value(s.target, 0), Some(&FieldValue::Float(42.0)));
        assert_eq!(s.at(1.5), 7.5);
        assert_eq!(s.at(3.0), 42.0);
    }

    #[test]
    fn animated_values_flow_through_routes() {
        let mut s = Scene::new();
        let shape = s.g.tag(s.target).unwrap();
        let mirror = s.g.new_node(shape).unwrap();
        s.g.append_child(s.root, mirror).unwrap();
        s.g.create_route(s.target, 0, mirror, 0).unwrap();
        s.animate(0.0, 2.0, size_anim(s.target, 0.0, 10.0)).unwrap();
        s.at(1.0);
        assert_eq!(s.g.field_value(mirror, 0), Ok(&FieldValue::Float(5.0)));
    }

    #[test]
    fn booleans_animate_discretely() {
        let mut s = Scene::new();
        let blink = Animation::new(s.target, 1)
            .with_values(vec![FieldValue::Bool(false), FieldValue::Bool(true)]);
        s.animate(0.0, 2.0, blink).unwrap();
        s.at(0.5);
        assert_eq!(s.g.field_value(s.target, 1), Ok(&FieldValue::Bool(false)));
        s.at(1.5);
        assert_eq!(s.g.field_value(s.target, 1), Ok(&FieldValue::Bool(true)));
    }

    #[test]
    fn curve_keys_drive_scalar_fields() {
        let mut s = Scene::new();
        let mut curve = Animation::new(s.target, 0);
        curve.curve = Some(Curve::Scalar(Nurbs::bezier(vec![0.0, 8.0, 0.0]).unwrap()));
        s.animate(0.0, 2.0, curve).unwrap();
        assert_eq!(s.at(1.0), 4.0);
    }

    #[test]
    fn invalid_tables_are_rejected() {
        let mut s = Scene::new();
        let values = vec![FieldValue::Float(0.0), FieldValue::Float(1.0), FieldValue::Float(2.0)];

        let mut bad_times = Animation::new(s.target, 0).with_values(values.clone());
        bad_times.key_times = Some(vec![0.0, 0.7, 0.5]);
        assert!(matches!(s.animate(0.0, 1.0, bad_times), Err(Error::InvalidCurve(_))));

        let mut open_end = Animation::new(s.target, 0).with_values(values.clone());
        open_end.key_times = Some(vec![0.0, 0.5, 0.9]);
        assert!(matches!(s.animate(0.0, 1.0, open_end), Err(Error::InvalidCurve(_))));

        let mut splines = Animation::new(s.target, 0).with_values(values);
        splines.calc_mode = CalcMode::Spline;
        splines.key_splines = vec![KeySpline::new(0.0, 0.0, 1.0, 1.0).unwrap()];
        assert!(matches!(s.animate(0.0, 1.0, splines), Err(Error::InvalidCurve(_))));

        let wrong_type = Animation::new(s.target, 0).with_values(vec![FieldValue::from("big")]);
        assert!(matches!(s.animate(0.0, 1.0, wrong_type), Err(Error::TypeMismatch { .. })));

        let empty = Animation::new(s.target, 0);
        assert!(matches!(s.animate(0.0, 1.0, empty), Err(Error::InvalidCurve(_))));
    }

    #[test]
    fn destroyed_animation_releases_the_attribute() {
        let mut s = Scene::new();
        let a = s.animate(0.0, 4.0, size_anim(s.target, 0.0, 10.0)).unwrap();
        assert_eq!(s.at(1.0), 2.5);
        s.g.remove_child(s.root, a).unwrap();
        assert_eq!(s.at(2.0), 1.0);
    }
}
