use crate::model::{Application, Class, Package};

/// Trait for implementing package tree traversal operations.
///
/// The visitor receives callbacks when entering and exiting packages. Classes
/// of a package are visited right after entering it, before its sub-packages,
/// which yields a stable pre-order over both entity categories.
pub trait PackageVisitor {
    /// Called when entering a package (before its classes and sub-packages).
    ///
    /// Returns true to continue traversing children, false to skip the subtree.
    fn enter_package(&mut self, package: &Package) -> bool;

    /// Called for every class of an entered package.
    fn visit_class(&mut self, _class: &Class, _owner: &Package) {}

    /// Called when exiting a package (after processing its children).
    fn exit_package(&mut self, _package: &Package) {}
}

/// Walks the package tree starting from a given package.
pub fn walk_package<V: PackageVisitor>(package: &Package, visitor: &mut V) {
    if visitor.enter_package(package) {
        for class in &package.classes {
            visitor.visit_class(class, package);
        }
        for sub_package in &package.sub_packages {
            walk_package(sub_package, visitor);
        }
    }
    visitor.exit_package(package);
}

/// Walks every root package of an application in order.
pub fn walk_application<V: PackageVisitor>(application: &Application, visitor: &mut V) {
    for package in &application.packages {
        walk_package(package, visitor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        skip: Option<&'static str>,
    }

    impl PackageVisitor for Recorder {
        fn enter_package(&mut self, package: &Package) -> bool {
            self.events.push(format!("enter {}", package.id));
            self.skip != Some(package.id.as_str())
        }

        fn visit_class(&mut self, class: &Class, owner: &Package) {
            self.events.push(format!("class {} in {}", class.id, owner.id));
        }

        fn exit_package(&mut self, package: &Package) {
            self.events.push(format!("exit {}", package.id));
        }
    }

    fn application() -> Application {
        Application::new(
            "app",
            "App",
            vec![Package::new("root", "root")
                .with_class(Class::new("r1", "Main"))
                .with_sub_package(Package::new("a", "a").with_class(Class::new("a1", "A1")))
                .with_sub_package(Package::new("b", "b"))],
        )
    }

    #[test]
    fn test_walk_is_pre_order() {
        let mut recorder = Recorder::default();
        walk_application(&application(), &mut recorder);

        assert_eq!(
            recorder.events,
            vec![
                "enter root",
                "class r1 in root",
                "enter a",
                "class a1 in a",
                "exit a",
                "enter b",
                "exit b",
                "exit root",
            ]
        );
    }

    #[test]
    fn test_walk_skips_subtree() {
        let mut recorder = Recorder {
            skip: Some("a"),
            ..Default::default()
        };
        walk_application(&application(), &mut recorder);

        assert!(recorder.events.contains(&"exit a".to_string()));
        assert!(!recorder.events.iter().any(|event| event.starts_with("class a1")));
    }
}
