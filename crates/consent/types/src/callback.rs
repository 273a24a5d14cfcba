use crate::consent::ConsentState;
use crate::element::{ElementHandle, LoadFailure};

/// Record passed to every script callback.
///
/// `element` is set only for scripts attached to the document (never for
/// callback-only scripts). `error` is set only on failure callbacks.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptCallbackInfo {
    /// Logical script id from the descriptor.
    pub id: String,
    /// Resolved element identity (anonymized or prefixed).
    pub element_id: String,
    /// Whether the script's condition held when the callback fired.
    pub has_consent: bool,
    /// Consent state the operation ran against.
    pub consents: ConsentState,
    pub element: Option<ElementHandle>,
    pub error: Option<LoadFailure>,
}

impl ScriptCallbackInfo {
    pub fn new(
        id: impl Into<String>,
        element_id: impl Into<String>,
        has_consent: bool,
        consents: ConsentState,
    ) -> Self {
        Self {
            id: id.into(),
            element_id: element_id.into(),
            has_consent,
            consents,
            element: None,
            error: None,
        }
    }

    pub fn with_element(mut self, element: Option<ElementHandle>) -> Self {
        self.element = element;
        self
    }

    pub fn with_error(mut self, error: LoadFailure) -> Self {
        self.error = Some(error);
        self
    }
}
