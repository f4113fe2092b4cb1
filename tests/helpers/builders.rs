use canopy::authz::context::RequestCtx;
use canopy::authz::types::Node;
use canopy::directory::Directory;

/// Builder for creating test accounts
pub struct AccountBuilder {
    name: String,
    enabled: bool,
}

impl AccountBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub async fn create(self, dir: &Directory) -> Node {
        let ctx = RequestCtx::new();
        let mut account = dir
            .create_account(&ctx, &self.name)
            .await
            .expect("Failed to create test account");

        if !self.enabled {
            dir.set_account_enabled(&ctx, &account.id, false)
                .await
                .expect("Failed to disable test account");
            account.enabled = false;
        }
        account
    }
}

/// Builder for creating test objects under a namespace or another object
pub struct ObjectBuilder {
    name: String,
    parent: String,
}

impl ObjectBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: String::new(),
        }
    }

    pub fn under(mut self, parent: &Node) -> Self {
        self.parent = parent.id.clone();
        self
    }

    pub async fn create(self, dir: &Directory) -> Node {
        dir.create_object(&RequestCtx::new(), &self.name, &self.parent)
            .await
            .expect("Failed to create test object")
    }
}
