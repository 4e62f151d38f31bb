//! Ordered composition of fix-up units

use crate::context::FixupContext;
use crate::derivations::DerivationSet;
use crate::error::FixupError;
use crate::hooks::HookSet;
use crate::unit::Fixup;
use labtrace_model::{AttachTarget, NodeId};

/// Units run in registration order
///
/// The pipeline is itself a [`Fixup`], so pipelines nest. A unit's error is
/// attributed to it by name and stops the remaining units.
#[derive(Default)]
pub struct FixupPipeline {
    units: Vec<Box<dyn Fixup>>,
}

impl std::fmt::Debug for FixupPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixupPipeline")
            .field("units", &self.names())
            .finish()
    }
}

impl FixupPipeline {
    /// Empty pipeline
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a unit
    #[must_use]
    pub fn with(mut self, unit: impl Fixup + 'static) -> Self {
        self.push(Box::new(unit));
        self
    }

    /// Append a unit
    pub fn push(&mut self, unit: Box<dyn Fixup>) {
        tracing::debug!(unit = unit.name(), hooks = %unit.hooks(), "fix-up registered");
        self.units.push(unit);
    }

    /// Unit names in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// Number of units
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no unit is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn each<F>(&mut self, hook: HookSet, mut f: F) -> Result<(), FixupError>
    where
        F: FnMut(&mut dyn Fixup) -> Result<(), FixupError>,
    {
        for unit in &mut self.units {
            if unit.hooks().contains(hook) {
                let name = unit.name().to_string();
                f(unit.as_mut()).map_err(|e| e.in_unit(&name))?;
            }
        }
        Ok(())
    }
}

impl Fixup for FixupPipeline {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn hooks(&self) -> HookSet {
        self.units
            .iter()
            .fold(HookSet::NONE, |set, unit| set | unit.hooks())
    }

    fn before_resolve(
        &mut self,
        ctx: &mut FixupContext<'_>,
        activity: NodeId,
    ) -> Result<(), FixupError> {
        self.each(HookSet::BEFORE_RESOLVE, |unit| {
            unit.before_resolve(ctx, activity)
        })
    }

    fn after_resolve(
        &mut self,
        ctx: &mut FixupContext<'_>,
        activity: NodeId,
        derivations: &mut DerivationSet,
    ) -> Result<(), FixupError> {
        self.each(HookSet::AFTER_RESOLVE, |unit| {
            unit.after_resolve(ctx, activity, derivations)
        })
    }

    fn on_item_interned(
        &mut self,
        ctx: &mut FixupContext<'_>,
        item: NodeId,
    ) -> Result<(), FixupError> {
        self.each(HookSet::ITEM_INTERNED, |unit| unit.on_item_interned(ctx, item))
    }

    fn on_attach(
        &mut self,
        ctx: &mut FixupContext<'_>,
        association: NodeId,
        target: &mut Option<AttachTarget>,
    ) -> Result<(), FixupError> {
        self.each(HookSet::ATTACH, |unit| {
            if target.is_none() {
                return Ok(());
            }
            unit.on_attach(ctx, association, target)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labtrace_model::EdgeOrigin;
    use labtrace_registry::TraceBuilder;
    use labtrace_source::TraceSnapshot;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        hooks: HookSet,
        log: Log,
        fail: bool,
    }

    impl Fixup for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn hooks(&self) -> HookSet {
            self.hooks
        }

        fn after_resolve(
            &mut self,
            _ctx: &mut FixupContext<'_>,
            _activity: NodeId,
            derivations: &mut DerivationSet,
        ) -> Result<(), FixupError> {
            self.log
                .borrow_mut()
                .push(format!("{}:{}", self.name, derivations.len()));
            if self.fail {
                return Err(anyhow::anyhow!("refused").into());
            }
            derivations.add(
                NodeId::from_index(10 + derivations.len()),
                NodeId::from_index(1),
                EdgeOrigin::Fixup(self.name.to_string()),
            );
            Ok(())
        }
    }

    fn recorder(name: &'static str, hooks: HookSet, log: &Log) -> Recorder {
        Recorder {
            name,
            hooks,
            log: Rc::clone(log),
            fail: false,
        }
    }

    #[test]
    fn units_run_in_order_and_see_earlier_edits() {
        let log = Log::default();
        let mut pipeline = FixupPipeline::new()
            .with(recorder("a", HookSet::AFTER_RESOLVE, &log))
            .with(recorder("skipped", HookSet::BEFORE_RESOLVE, &log))
            .with(recorder("b", HookSet::AFTER_RESOLVE, &log));
        assert_eq!(pipeline.names(), vec!["a", "skipped", "b"]);
        assert_eq!(
            pipeline.hooks(),
            HookSet::AFTER_RESOLVE | HookSet::BEFORE_RESOLVE
        );

        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let mut ctx = FixupContext::new(&mut builder, &source);
        let mut derivations = DerivationSet::new(NodeId::from_index(0));
        pipeline
            .after_resolve(&mut ctx, NodeId::from_index(0), &mut derivations)
            .unwrap();

        assert_eq!(*log.borrow(), vec!["a:0".to_string(), "b:1".to_string()]);
        assert_eq!(derivations.len(), 2);
    }

    #[test]
    fn failure_names_unit_and_stops_pipeline() {
        let log = Log::default();
        let mut failing = recorder("broken", HookSet::AFTER_RESOLVE, &log);
        failing.fail = true;
        let mut pipeline = FixupPipeline::new()
            .with(failing)
            .with(recorder("after", HookSet::AFTER_RESOLVE, &log));

        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let mut ctx = FixupContext::new(&mut builder, &source);
        let mut derivations = DerivationSet::new(NodeId::from_index(0));
        let err = pipeline
            .after_resolve(&mut ctx, NodeId::from_index(0), &mut derivations)
            .unwrap_err();

        assert_eq!(err.unit(), Some("broken"));
        assert_eq!(*log.borrow(), vec!["broken:0".to_string()]);
    }

    #[test]
    fn nested_pipelines_keep_inner_names() {
        let log = Log::default();
        let mut failing = recorder("inner", HookSet::AFTER_RESOLVE, &log);
        failing.fail = true;
        let mut pipeline = FixupPipeline::new().with(FixupPipeline::new().with(failing));

        let source = TraceSnapshot::new();
        let mut builder = TraceBuilder::new();
        let mut ctx = FixupContext::new(&mut builder, &source);
        let mut derivations = DerivationSet::new(NodeId::from_index(0));
        let err = pipeline
            .after_resolve(&mut ctx, NodeId::from_index(0), &mut derivations)
            .unwrap_err();
        assert_eq!(err.unit(), Some("inner"));
    }
}
