//! # Operator Session
//!
//! The acting user, passed explicitly into every core operation. There is
//! no ambient "current user". Backend credentials live with the HTTP
//! client, never here.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Who is operating the terminal right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OperatorSession {
    pub user_id: String,
    /// Name printed on sales and recorded as supervisor on closures.
    pub display_name: String,
}

impl OperatorSession {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        OperatorSession {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}
