use parking_lot::Mutex;
use serde_json::Value;
use tether_core::{ResponseBody, CODE_SERVER_ERROR, MSG_SERVER_ERROR};

use crate::errors::ResponseError;

/// One-shot response slot handed to handlers and middleware.
///
/// The first body set wins; every later attempt returns
/// [`ResponseError::AlreadyReplied`] and leaves the stored body intact, so
/// middleware running after a handler cannot clobber its reply.
pub struct Response {
    uuid: String,
    body: Mutex<Option<ResponseBody>>,
}

impl Response {
    pub(crate) fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            body: Mutex::new(None),
        }
    }

    /// Reply with a success body carrying `data`.
    pub fn success(&self, data: Value) -> Result<(), ResponseError> {
        self.set(ResponseBody::ok(self.uuid.clone(), data))
    }

    /// Reply with the generic failure body.
    pub fn fail(&self) -> Result<(), ResponseError> {
        self.fail_with_code_and_message(CODE_SERVER_ERROR, MSG_SERVER_ERROR)
    }

    /// Reply with a failure body carrying `code` and the default message.
    pub fn fail_with_code(&self, code: i32) -> Result<(), ResponseError> {
        self.fail_with_code_and_message(code, MSG_SERVER_ERROR)
    }

    /// Reply with a failure body carrying the default code and `message`.
    pub fn fail_with_message(&self, message: impl Into<String>) -> Result<(), ResponseError> {
        self.fail_with_code_and_message(CODE_SERVER_ERROR, message)
    }

    /// Reply with a failure body carrying `code` and `message`.
    pub fn fail_with_code_and_message(
        &self,
        code: i32,
        message: impl Into<String>,
    ) -> Result<(), ResponseError> {
        self.set(ResponseBody::fail(self.uuid.clone(), code, message))
    }

    pub fn is_replied(&self) -> bool {
        self.body.lock().is_some()
    }

    /// The body set so far, if any.
    pub fn body(&self) -> Option<ResponseBody> {
        self.body.lock().clone()
    }

    /// The final body: whatever was set, or the generic failure for a
    /// handler that never replied.
    pub(crate) fn take_or_default(&self) -> ResponseBody {
        self.body
            .lock()
            .take()
            .unwrap_or_else(|| ResponseBody::fail(self.uuid.clone(), CODE_SERVER_ERROR, MSG_SERVER_ERROR))
    }

    fn set(&self, body: ResponseBody) -> Result<(), ResponseError> {
        let mut slot = self.body.lock();
        if slot.is_some() {
            return Err(ResponseError::AlreadyReplied);
        }
        *slot = Some(body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::{CODE_OK, MSG_SUCCESS};

    #[test]
    fn first_reply_wins() {
        let response = Response::new("u1");
        response.success(json!({"a": 1})).unwrap();
        assert_eq!(
            response.fail_with_code(7),
            Err(ResponseError::AlreadyReplied)
        );

        let body = response.body().unwrap();
        assert_eq!(body.code, CODE_OK);
        assert_eq!(body.message, MSG_SUCCESS);
        assert_eq!(body.data, json!({"a": 1}));
        assert_eq!(body.uuid, "u1");
    }

    #[test]
    fn failure_variants() {
        let response = Response::new("u");
        response.fail_with_code_and_message(42, "nope").unwrap();
        let body = response.body().unwrap();
        assert_eq!(body.code, 42);
        assert_eq!(body.message, "nope");

        let response = Response::new("u");
        response.fail_with_message("spilled").unwrap();
        let body = response.body().unwrap();
        assert_eq!(body.code, CODE_SERVER_ERROR);
        assert_eq!(body.message, "spilled");

        let response = Response::new("u");
        response.fail().unwrap();
        let body = response.body().unwrap();
        assert_eq!(body.code, CODE_SERVER_ERROR);
        assert_eq!(body.message, MSG_SERVER_ERROR);
    }

    #[test]
    fn unreplied_defaults_to_server_error() {
        let response = Response::new("u9");
        assert!(!response.is_replied());

        let body = response.take_or_default();
        assert_eq!(body.uuid, "u9");
        assert_eq!(body.code, CODE_SERVER_ERROR);
        assert_eq!(body.message, MSG_SERVER_ERROR);
    }

    #[test]
    fn take_returns_set_body() {
        let response = Response::new("u");
        response.success(json!(null)).unwrap();
        assert!(response.is_replied());
        assert_eq!(response.take_or_default().code, CODE_OK);
    }
}
