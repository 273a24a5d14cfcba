use std::collections::{BTreeMap, VecDeque};

use consent_types::{ElementHandle, LoadFailure, ScriptTarget};
use tracing::debug;

use crate::document::{
    CompletionListener, DeferredTask, DocumentEnvironment, FailureListener, ScriptElement,
};
use crate::error::CallbackError;

/// In-memory document environment.
///
/// Elements stay known after detachment so their final state can be
/// inspected. Native signals are driven explicitly through
/// [`complete`](MemoryDocument::complete), [`fail`](MemoryDocument::fail) and
/// [`run_deferred`](MemoryDocument::run_deferred).
#[derive(Default)]
pub struct MemoryDocument {
    next_handle: u64,
    elements: BTreeMap<ElementHandle, StoredElement>,
    deferred: VecDeque<DeferredTask>,
}

struct StoredElement {
    element: ScriptElement,
    /// `None` while detached.
    attached_to: Option<ScriptTarget>,
    on_complete: Option<CompletionListener>,
    on_fail: Option<FailureListener>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&self, handle: ElementHandle) -> Option<&ScriptElement> {
        self.elements.get(&handle).map(|stored| &stored.element)
    }

    /// Insertion point of an attached element.
    pub fn target_of(&self, handle: ElementHandle) -> Option<ScriptTarget> {
        self.elements
            .get(&handle)
            .and_then(|stored| stored.attached_to)
    }

    pub fn is_attached(&self, handle: ElementHandle) -> bool {
        self.target_of(handle).is_some()
    }

    /// Attached elements in creation order.
    pub fn attached(&self) -> Vec<ElementHandle> {
        self.elements
            .iter()
            .filter(|(_, stored)| stored.attached_to.is_some())
            .map(|(handle, _)| *handle)
            .collect()
    }

    pub fn attached_count(&self) -> usize {
        self.elements
            .values()
            .filter(|stored| stored.attached_to.is_some())
            .count()
    }

    /// Attached elements at one insertion point.
    pub fn attached_in(&self, target: ScriptTarget) -> Vec<&ScriptElement> {
        self.elements
            .values()
            .filter(|stored| stored.attached_to == Some(target))
            .map(|stored| &stored.element)
            .collect()
    }

    /// Number of elements ever created.
    pub fn created_count(&self) -> usize {
        self.elements.len()
    }

    pub fn pending_tasks(&self) -> usize {
        self.deferred.len()
    }

    /// Signal that an element finished loading.
    ///
    /// Fires the completion listener, if any, and discards the failure
    /// listener: each element settles at most once.
    ///
    /// # Errors
    ///
    /// Whatever the listener returns.
    pub fn complete(&mut self, handle: ElementHandle) -> Result<(), CallbackError> {
        let Some(stored) = self.elements.get_mut(&handle) else {
            return Ok(());
        };
        stored.on_fail = None;
        match stored.on_complete.take() {
            Some(listener) => listener(),
            None => Ok(()),
        }
    }

    /// Signal that an element failed to load.
    ///
    /// # Errors
    ///
    /// Whatever the listener returns.
    pub fn fail(
        &mut self,
        handle: ElementHandle,
        failure: LoadFailure,
    ) -> Result<(), CallbackError> {
        let Some(stored) = self.elements.get_mut(&handle) else {
            return Ok(());
        };
        stored.on_complete = None;
        match stored.on_fail.take() {
            Some(listener) => listener(failure),
            None => Ok(()),
        }
    }

    /// Run the tasks queued so far, in order. Tasks queued while running wait
    /// for the next call.
    ///
    /// # Errors
    ///
    /// Stops at the first failing task; the remaining tasks stay queued.
    pub fn run_deferred(&mut self) -> Result<usize, CallbackError> {
        let batch = self.deferred.len();
        let mut ran = 0;
        while ran < batch {
            let Some(task) = self.deferred.pop_front() else {
                break;
            };
            ran += 1;
            task()?;
        }
        Ok(ran)
    }
}

impl DocumentEnvironment for MemoryDocument {
    fn create_script(&mut self, element: ScriptElement) -> ElementHandle {
        self.next_handle += 1;
        let handle = ElementHandle(self.next_handle);
        debug!(%handle, element_id = %element.element_id, "Created script element");
        self.elements.insert(
            handle,
            StoredElement {
                element,
                attached_to: None,
                on_complete: None,
                on_fail: None,
            },
        );
        handle
    }

    fn attach(&mut self, handle: ElementHandle, target: ScriptTarget) {
        if let Some(stored) = self.elements.get_mut(&handle) {
            stored.attached_to = Some(target);
        }
    }

    fn find_by_identity(&self, element_id: &str) -> Option<ElementHandle> {
        self.elements
            .iter()
            .find(|(_, stored)| {
                stored.attached_to.is_some() && stored.element.element_id == element_id
            })
            .map(|(handle, _)| *handle)
    }

    fn detach(&mut self, handle: ElementHandle) {
        if let Some(stored) = self.elements.get_mut(&handle) {
            stored.attached_to = None;
        }
    }

    fn on_complete(&mut self, handle: ElementHandle, listener: CompletionListener) {
        if let Some(stored) = self.elements.get_mut(&handle) {
            stored.on_complete = Some(listener);
        }
    }

    fn on_fail(&mut self, handle: ElementHandle, listener: FailureListener) {
        if let Some(stored) = self.elements.get_mut(&handle) {
            stored.on_fail = Some(listener);
        }
    }

    fn defer(&mut self, task: DeferredTask) {
        self.deferred.push_back(task);
    }
}
