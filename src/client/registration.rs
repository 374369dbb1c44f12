//! Write-once connection registration.
//!
//! A connection starts `Unregistered` and moves to `Registered` through
//! `Registration::register`, exactly once. A second attempt fails and leaves
//! the existing role and topic untouched.

use std::fmt;

use crate::broker::topic::TopicName;
use crate::utils::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Publisher,
    Subscriber,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Publisher => "publisher",
            Role::Subscriber => "subscriber",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Registration {
    #[default]
    Unregistered,
    Registered { role: Role, topic: TopicName },
}

impl Registration {
    /// Bind role and topic. Fails if already registered.
    pub fn register(&mut self, role: Role, topic: TopicName) -> Result<(), ProtocolError> {
        match self {
            Registration::Registered {
                role: current,
                topic: bound,
            } => Err(ProtocolError::AlreadyRegistered {
                role: current.to_string(),
                topic: bound.clone(),
            }),
            Registration::Unregistered => {
                *self = Registration::Registered { role, topic };
                Ok(())
            }
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            Registration::Registered { role, .. } => Some(*role),
            Registration::Unregistered => None,
        }
    }

    pub fn topic(&self) -> Option<&str> {
        match self {
            Registration::Registered { topic, .. } => Some(topic),
            Registration::Unregistered => None,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Registration::Registered { .. })
    }
}
