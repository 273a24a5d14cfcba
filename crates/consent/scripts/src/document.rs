use consent_types::{ElementHandle, LoadFailure, ScriptTarget};

use crate::error::CallbackResult;
use crate::script::LoadingHints;

/// Listener fired once when an external script finishes loading.
pub type CompletionListener = Box<dyn FnOnce() -> CallbackResult>;

/// Listener fired once when an external script fails to load.
pub type FailureListener = Box<dyn FnOnce(LoadFailure) -> CallbackResult>;

/// Work scheduled for the next tick of the host task queue.
pub type DeferredTask = Box<dyn FnOnce() -> CallbackResult>;

/// Everything the environment needs to build a script element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptElement {
    pub element_id: String,
    pub src: Option<String>,
    pub text_content: Option<String>,
    pub hints: LoadingHints,
}

/// Capability interface over the host document.
///
/// The loader performs every side effect through this trait. A browser
/// binding maps it onto the DOM; [`MemoryDocument`](crate::MemoryDocument)
/// keeps the same state in memory.
pub trait DocumentEnvironment {
    /// Create a detached element with every hint and attribute applied.
    fn create_script(&mut self, element: ScriptElement) -> ElementHandle;

    /// Insert an element at the given insertion point.
    fn attach(&mut self, handle: ElementHandle, target: ScriptTarget);

    /// Find an attached element carrying `element_id`.
    fn find_by_identity(&self, element_id: &str) -> Option<ElementHandle>;

    /// Remove an element from the document. Unknown handles are ignored.
    fn detach(&mut self, handle: ElementHandle);

    /// Register the native completion signal. It may never fire.
    fn on_complete(&mut self, handle: ElementHandle, listener: CompletionListener);

    /// Register the native failure signal. It may never fire.
    fn on_fail(&mut self, handle: ElementHandle, listener: FailureListener);

    /// Schedule `task` after the current operation returns.
    fn defer(&mut self, task: DeferredTask);
}
