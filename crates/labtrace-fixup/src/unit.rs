//! The fix-up unit trait

use crate::context::FixupContext;
use crate::derivations::DerivationSet;
use crate::error::FixupError;
use crate::hooks::HookSet;
use labtrace_model::{AttachTarget, NodeId};

/// A heuristic that corrects the trace at fixed extension points
///
/// Every hook defaults to a no-op. A unit is only called at the hooks it
/// lists in [`Fixup::hooks`].
pub trait Fixup {
    /// Name recorded as the origin of edges the unit adds
    fn name(&self) -> &str;

    /// Hooks the unit implements
    fn hooks(&self) -> HookSet;

    /// Before derivations of `activity` are resolved
    ///
    /// May inject synthetic bindings.
    ///
    /// # Errors
    /// Any error aborts the pass
    fn before_resolve(
        &mut self,
        _ctx: &mut FixupContext<'_>,
        _activity: NodeId,
    ) -> Result<(), FixupError> {
        Ok(())
    }

    /// After derivations of `activity` are proposed, before they are committed
    ///
    /// # Errors
    /// Any error aborts the pass
    fn after_resolve(
        &mut self,
        _ctx: &mut FixupContext<'_>,
        _activity: NodeId,
        _derivations: &mut DerivationSet,
    ) -> Result<(), FixupError> {
        Ok(())
    }

    /// After a new item, collection or part is interned and its source
    /// attributes are applied
    ///
    /// # Errors
    /// Any error aborts the pass
    fn on_item_interned(
        &mut self,
        _ctx: &mut FixupContext<'_>,
        _item: NodeId,
    ) -> Result<(), FixupError> {
        Ok(())
    }

    /// Before `association` is attached to `target`
    ///
    /// Setting `target` to `None` skips the attachment.
    ///
    /// # Errors
    /// Any error aborts the pass
    fn on_attach(
        &mut self,
        _ctx: &mut FixupContext<'_>,
        _association: NodeId,
        _target: &mut Option<AttachTarget>,
    ) -> Result<(), FixupError> {
        Ok(())
    }
}
