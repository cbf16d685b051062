//! Document paths for one owner's data.
//!
//! ```text
//! users/{owner}                               profile
//! users/{owner}/products/{id}
//! users/{owner}/transactions/{id}
//! users/{owner}/categories/{id}
//! users/{owner}/debts/{id}
//! users/{owner}/debts/{debtId}/payments/{id}
//! ```

use bolsita_core::OwnerId;

use crate::store::DocPath;

/// Collection holding every profile document.
pub const USERS: &str = "users";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerScope {
    owner: OwnerId,
}

impl OwnerScope {
    pub fn new(owner: OwnerId) -> Self {
        OwnerScope { owner }
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    fn collection(&self, name: &str) -> String {
        format!("{}/{}/{}", USERS, self.owner.as_str(), name)
    }

    pub fn products(&self) -> String {
        self.collection("products")
    }

    pub fn transactions(&self) -> String {
        self.collection("transactions")
    }

    pub fn categories(&self) -> String {
        self.collection("categories")
    }

    pub fn debts(&self) -> String {
        self.collection("debts")
    }

    pub fn payments(&self, debt_id: &str) -> String {
        format!("{}/{}/payments", self.debts(), debt_id)
    }

    pub fn product(&self, id: &str) -> DocPath {
        DocPath::new(self.products(), id)
    }

    pub fn transaction(&self, id: &str) -> DocPath {
        DocPath::new(self.transactions(), id)
    }

    pub fn category(&self, id: &str) -> DocPath {
        DocPath::new(self.categories(), id)
    }

    pub fn debt(&self, id: &str) -> DocPath {
        DocPath::new(self.debts(), id)
    }

    pub fn payment(&self, debt_id: &str, id: &str) -> DocPath {
        DocPath::new(self.payments(debt_id), id)
    }

    pub fn profile(&self) -> DocPath {
        DocPath::new(USERS, self.owner.as_str())
    }
}

/// Fresh document id.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
