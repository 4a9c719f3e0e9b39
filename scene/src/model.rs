//! Structural model of a software landscape.
//!
//! An [`Application`] owns a forest of [`Package`]s. Packages own their
//! sub-packages and [`Class`]es. Parent references are stored as ids so the
//! tree can be walked upwards without shared ownership.

use std::collections::HashMap;

/// Stable string identifier of a package, class or communication.
pub type EntityId = String;

/// A class node. Always a leaf of the package tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub id: EntityId,
    pub name: String,
    /// Id of the owning package, filled in by [`Application::new`].
    pub parent_id: EntityId,
}

impl Class {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            parent_id: EntityId::new(),
        }
    }
}

/// A package (rendered as a component box).
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    pub id: EntityId,
    pub name: String,
    /// Nesting depth. Root packages are level 0.
    pub level: u32,
    pub parent_id: Option<EntityId>,
    pub classes: Vec<Class>,
    pub sub_packages: Vec<Package>,
}

impl Package {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            level: 0,
            parent_id: None,
            classes: Vec::new(),
            sub_packages: Vec::new(),
        }
    }

    /// Builder-style helper adding a class.
    pub fn with_class(mut self, class: Class) -> Self {
        self.classes.push(class);
        self
    }

    /// Builder-style helper adding a sub-package.
    pub fn with_sub_package(mut self, package: Package) -> Self {
        self.sub_packages.push(package);
        self
    }

    fn link(&mut self, level: u32, parent_id: Option<EntityId>) {
        self.level = level;
        self.parent_id = parent_id;
        for class in &mut self.classes {
            class.parent_id = self.id.clone();
        }
        let own_id = self.id.clone();
        for package in &mut self.sub_packages {
            package.link(level + 1, Some(own_id.clone()));
        }
    }

    fn count_into(&self, counts: &mut StructureCounts) {
        counts.packages += 1;
        counts.classes += self.classes.len();
        for package in &self.sub_packages {
            package.count_into(counts);
        }
    }
}

/// Number of entities per category, used to presize instance buffers.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct StructureCounts {
    pub packages: usize,
    pub classes: usize,
}

/// A directed (or bidirectional) call relation between two classes.
#[derive(Debug, Clone, PartialEq)]
pub struct Communication {
    pub id: EntityId,
    pub source_class_id: EntityId,
    pub target_class_id: EntityId,
    pub source_app_id: EntityId,
    pub target_app_id: EntityId,
    pub request_count: u64,
    pub is_bidirectional: bool,
}

impl Communication {
    /// A communication whose source and target are the same class.
    pub fn is_recursive(&self) -> bool {
        self.source_class_id == self.target_class_id
    }

    /// Whether both endpoints live in different applications.
    pub fn is_cross_application(&self) -> bool {
        self.source_app_id != self.target_app_id
    }
}

/// Root of the structural model for one application.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub id: EntityId,
    pub name: String,
    pub packages: Vec<Package>,
}

impl Application {
    /// Creates an application and fills in levels and parent ids of the tree.
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>, mut packages: Vec<Package>) -> Self {
        for package in &mut packages {
            package.link(0, None);
        }
        Self {
            id: id.into(),
            name: name.into(),
            packages,
        }
    }

    /// Counts packages and classes of the whole tree.
    pub fn counts(&self) -> StructureCounts {
        let mut counts = StructureCounts::default();
        for package in &self.packages {
            package.count_into(&mut counts);
        }
        counts
    }

    /// Finds a package anywhere in the tree.
    pub fn find_package(&self, id: &str) -> Option<&Package> {
        fn find<'a>(packages: &'a [Package], id: &str) -> Option<&'a Package> {
            packages.iter().find_map(|package| {
                if package.id == id {
                    Some(package)
                } else {
                    find(&package.sub_packages, id)
                }
            })
        }
        find(&self.packages, id)
    }

    /// Finds a class anywhere in the tree.
    pub fn find_class(&self, id: &str) -> Option<&Class> {
        fn find<'a>(packages: &'a [Package], id: &str) -> Option<&'a Class> {
            packages.iter().find_map(|package| {
                package
                    .classes
                    .iter()
                    .find(|class| class.id == id)
                    .or_else(|| find(&package.sub_packages, id))
            })
        }
        find(&self.packages, id)
    }

    /// Maps every class id to the id of its owning package.
    pub fn class_owners(&self) -> HashMap<EntityId, EntityId> {
        fn collect(packages: &[Package], owners: &mut HashMap<EntityId, EntityId>) {
            for package in packages {
                for class in &package.classes {
                    owners.insert(class.id.clone(), package.id.clone());
                }
                collect(&package.sub_packages, owners);
            }
        }
        let mut owners = HashMap::new();
        collect(&self.packages, &mut owners);
        owners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_application() -> Application {
        Application::new(
            "app",
            "Shop",
            vec![Package::new("root", "net")
                .with_sub_package(
                    Package::new("a", "orders")
                        .with_class(Class::new("a1", "OrderService"))
                        .with_class(Class::new("a2", "OrderRepository")),
                )
                .with_sub_package(Package::new("b", "billing").with_class(Class::new("b1", "Invoice")))],
        )
    }

    #[test]
    fn test_application_links_levels_and_parents() {
        let app = sample_application();

        let root = app.find_package("root").unwrap();
        assert_eq!(root.level, 0);
        assert_eq!(root.parent_id, None);

        let a = app.find_package("a").unwrap();
        assert_eq!(a.level, 1);
        assert_eq!(a.parent_id.as_deref(), Some("root"));
        assert_eq!(app.find_class("a2").unwrap().parent_id, "a");
    }

    #[test]
    fn test_application_counts() {
        let counts = sample_application().counts();
        assert_eq!(counts, StructureCounts { packages: 3, classes: 3 });
    }

    #[test]
    fn test_class_owners() {
        let owners = sample_application().class_owners();
        assert_eq!(owners.len(), 3);
        assert_eq!(owners["b1"], "b");
        assert!(sample_application().find_class("missing").is_none());
    }

    #[test]
    fn test_communication_flags() {
        let mut communication = Communication {
            id: "c".into(),
            source_class_id: "a1".into(),
            target_class_id: "a1".into(),
            source_app_id: "app".into(),
            target_app_id: "app".into(),
            request_count: 10,
            is_bidirectional: false,
        };
        assert!(communication.is_recursive());
        assert!(!communication.is_cross_application());

        communication.target_class_id = "b1".into();
        communication.target_app_id = "other".into();
        assert!(!communication.is_recursive());
        assert!(communication.is_cross_application());
    }
}
