use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use uuid::Uuid;

/// Identity of whoever created a subscription, usually one loaded extension.
///
/// Two owners are equal only if one was cloned from the other; minting a new
/// owner with the same name gives a distinct identity. The bus never looks
/// past the identity.
#[derive(Clone)]
pub struct Owner {
    id: Uuid,
    name: Arc<str>,
}

impl Owner {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_valid(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Owner {}

impl Hash for Owner {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_not_name() {
        let a = Owner::new("ext1");
        let b = Owner::new("ext1");
        assert_ne!(a, b);
        assert_eq!(a, a.clone());

        let set: HashSet<Owner> = [a.clone(), a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_blank_name_is_invalid() {
        assert!(Owner::new("ext1").is_valid());
        assert!(!Owner::new("").is_valid());
        assert!(!Owner::new("   ").is_valid());
    }
}
