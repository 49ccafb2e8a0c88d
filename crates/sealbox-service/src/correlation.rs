//! Request correlation identifiers.
//!
//! Every request carries a unique id built from the action name, the
//! current unix-millisecond timestamp and 8 bytes of OS randomness. The
//! time component keeps ids roughly ordered in logs; the random component
//! makes collisions among outstanding requests vanishingly unlikely.

use std::fmt;

/// The two operations the worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Encrypt,
    Decrypt,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Encrypt => "encrypt",
            Action::Decrypt => "decrypt",
        }
    }
}

/// Correlation token tying one outstanding request to its single response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn next(action: Action) -> RequestId {
        use rand::RngCore;
        let mut random = [0u8; 8];
        rand::rngs::OsRng.fill_bytes(&mut random);
        let millis = chrono::Utc::now().timestamp_millis();
        RequestId(format!(
            "{}-{millis}-{}",
            action.as_str(),
            hex::encode(random)
        ))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
