//! Class Hierarchy for MiniJava
//!
//! Builds a forest of class trees from the `extends` edges. Trees live in an
//! arena and refer to each other by [`TreeId`], so parent links are plain
//! indices rather than back-pointers.

use std::collections::HashMap;

use tracing::debug;

use crate::ast::{ClassDecl, Program};
use crate::error::{CompileError, Result};

/// Index of a tree node in the forest arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(usize);

/// One class and its place in the hierarchy
#[derive(Debug)]
pub struct ClassTree<'a> {
    pub decl: &'a ClassDecl,
    pub parent: Option<TreeId>,
    pub children: Vec<TreeId>,
}

/// Forest of single-inheritance class trees
#[derive(Debug)]
pub struct ClassHierarchyForest<'a> {
    trees: Vec<ClassTree<'a>>,
    roots: Vec<TreeId>,
    by_name: HashMap<&'a str, TreeId>,
}

impl<'a> ClassHierarchyForest<'a> {
    /// Build the forest, failing on any illegal hierarchy.
    ///
    /// Classes are attached in declaration order. A superclass must be
    /// declared before its subclasses, which also rules out every cycle.
    pub fn build(program: &'a Program) -> Result<Self> {
        let main_name = program.main_class.name.as_str();

        let mut declared: HashMap<&str, usize> = HashMap::new();
        for (index, class) in program.classes.iter().enumerate() {
            if class.name == main_name {
                return Err(CompileError::hierarchy(
                    class.span,
                    format!("Class '{}' has the same name as the main class", class.name),
                ));
            }
            if declared.insert(&class.name, index).is_some() {
                return Err(CompileError::hierarchy(
                    class.span,
                    format!("Class '{}' is declared more than once", class.name),
                ));
            }
        }

        let mut forest = Self {
            trees: Vec::with_capacity(program.classes.len()),
            roots: Vec::new(),
            by_name: HashMap::new(),
        };

        for (index, class) in program.classes.iter().enumerate() {
            let parent = match &class.super_name {
                None => None,
                Some(super_name) if super_name == &class.name => {
                    return Err(CompileError::hierarchy(
                        class.span,
                        format!("Class '{}' extends itself", class.name),
                    ));
                }
                Some(super_name) => match declared.get(super_name.as_str()) {
                    None => {
                        return Err(CompileError::hierarchy(
                            class.span,
                            format!(
                                "Class '{}' extends undeclared class '{}'",
                                class.name, super_name
                            ),
                        ));
                    }
                    Some(&super_index) if super_index > index => {
                        return Err(CompileError::hierarchy(
                            class.span,
                            format!(
                                "Class '{}' extends '{}', which is declared later",
                                class.name, super_name
                            ),
                        ));
                    }
                    Some(_) => forest.by_name.get(super_name.as_str()).copied(),
                },
            };

            let id = TreeId(forest.trees.len());
            forest.trees.push(ClassTree {
                decl: class,
                parent,
                children: Vec::new(),
            });
            forest.by_name.insert(&class.name, id);

            match parent {
                Some(parent_id) => forest.trees[parent_id.0].children.push(id),
                None => forest.roots.push(id),
            }
        }

        debug!(
            classes = forest.trees.len(),
            roots = forest.roots.len(),
            "built class hierarchy"
        );

        Ok(forest)
    }

    pub fn tree(&self, id: TreeId) -> &ClassTree<'a> {
        &self.trees[id.0]
    }

    pub fn get(&self, name: &str) -> Option<&ClassTree<'a>> {
        self.by_name.get(name).map(|id| self.tree(*id))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn roots(&self) -> impl Iterator<Item = &ClassTree<'a>> {
        self.roots.iter().map(move |id| self.tree(*id))
    }

    /// Class names in declaration order
    pub fn class_names(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.trees.iter().map(|t| t.decl.name.as_str())
    }

    pub fn parent_of(&self, name: &str) -> Option<&'a ClassDecl> {
        let tree = self.get(name)?;
        tree.parent.map(|id| self.tree(id).decl)
    }

    /// Strict ancestors, nearest first
    pub fn ancestors(&self, name: &str) -> Vec<&'a ClassDecl> {
        let mut result = Vec::new();
        let mut current = self.get(name).and_then(|t| t.parent);
        while let Some(id) = current {
            let tree = self.tree(id);
            result.push(tree.decl);
            current = tree.parent;
        }
        result
    }

    /// Number of `extends` hops from `name` to its root
    pub fn depth(&self, name: &str) -> Option<usize> {
        self.get(name).map(|_| self.ancestors(name).len())
    }

    /// Whether `child` is `ancestor` or inherits from it
    pub fn is_subclass_of(&self, child: &str, ancestor: &str) -> bool {
        if !self.contains(child) {
            return false;
        }
        child == ancestor || self.ancestors(child).iter().any(|c| c.name == ancestor)
    }

    /// The highest class on the chain from `class` to its root that declares
    /// `method`; that is where the method's vtable slot was introduced.
    pub fn highest_ancestor_with_method(&self, class: &str, method: &str) -> Option<&'a ClassDecl> {
        let tree = self.get(class)?;
        let mut highest = tree.decl.has_method(method).then_some(tree.decl);
        for ancestor in self.ancestors(class) {
            if ancestor.has_method(method) {
                highest = Some(ancestor);
            }
        }
        highest
    }

    /// `name` followed by all of its descendants, pre-order
    pub fn family(&self, name: &str) -> Vec<&'a str> {
        let mut result = Vec::new();
        if let Some(&id) = self.by_name.get(name) {
            self.collect_family(id, &mut result);
        }
        result
    }

    fn collect_family(&self, id: TreeId, out: &mut Vec<&'a str>) {
        let tree = self.tree(id);
        out.push(tree.decl.name.as_str());
        for child in &tree.children {
            self.collect_family(*child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn program(classes: &str) -> Program {
        let source = format!(
            "class Main {{ public static void main(String[] a) {{ System.out.println(0); }} }}\n{}",
            classes
        );
        parse(&source).unwrap()
    }

    fn hierarchy_error(classes: &str) -> String {
        let program = program(classes);
        match ClassHierarchyForest::build(&program) {
            Err(CompileError::Hierarchy { message, .. }) => message,
            other => panic!("Expected hierarchy error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_forest_shape() {
        let program = program(
            "class A { } class B extends A { } class C extends B { } class D { } class E extends A { }",
        );
        let forest = ClassHierarchyForest::build(&program).unwrap();

        let roots: Vec<_> = forest.roots().map(|t| t.decl.name.as_str()).collect();
        assert_eq!(roots, vec!["A", "D"]);
        assert_eq!(forest.parent_of("C").map(|c| c.name.as_str()), Some("B"));
        assert!(forest.parent_of("A").is_none());
        assert_eq!(forest.family("A"), vec!["A", "B", "C", "E"]);
        assert_eq!(forest.family("D"), vec!["D"]);
        assert_eq!(forest.depth("C"), Some(2));
        assert_eq!(
            forest.class_names().collect::<Vec<_>>(),
            vec!["A", "B", "C", "D", "E"]
        );
    }

    #[test]
    fn test_is_subclass_of() {
        let program = program("class A { } class B extends A { } class C extends B { } class D { }");
        let forest = ClassHierarchyForest::build(&program).unwrap();
        assert!(forest.is_subclass_of("C", "A"));
        assert!(forest.is_subclass_of("C", "C"));
        assert!(!forest.is_subclass_of("A", "C"));
        assert!(!forest.is_subclass_of("D", "A"));
        assert!(!forest.is_subclass_of("Unknown", "A"));
    }

    #[test]
    fn test_every_chain_reaches_a_root() {
        let program = program(
            "class A { } class B extends A { } class C extends B { } class D extends C { } class E extends B { }",
        );
        let forest = ClassHierarchyForest::build(&program).unwrap();
        let count = program.classes.len();
        for name in forest.class_names() {
            let chain = forest.ancestors(name);
            assert!(chain.len() < count);
            let top = chain.last().map(|c| c.name.as_str()).unwrap_or(name);
            assert!(forest.roots().any(|r| r.decl.name == top));
        }
    }

    #[test]
    fn test_highest_ancestor_with_method() {
        let program = program(
            "class A { int f() { return 0; } }\n\
             class B extends A { int f() { return 1; } int g() { return 2; } }\n\
             class C extends B { int g() { return 3; } }",
        );
        let forest = ClassHierarchyForest::build(&program).unwrap();
        let name = |c: Option<&ClassDecl>| c.map(|c| c.name.clone());
        assert_eq!(name(forest.highest_ancestor_with_method("C", "f")), Some("A".into()));
        assert_eq!(name(forest.highest_ancestor_with_method("C", "g")), Some("B".into()));
        assert_eq!(name(forest.highest_ancestor_with_method("A", "g")), None);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let message = hierarchy_error("class A extends B { } class B extends A { }");
        assert!(message.contains("declared later"));
    }

    #[test]
    fn test_forward_reference_is_rejected() {
        let message = hierarchy_error("class B extends A { } class A { }");
        assert!(message.contains("declared later"));
    }

    #[test]
    fn test_self_inheritance_is_rejected() {
        let message = hierarchy_error("class A extends A { }");
        assert!(message.contains("extends itself"));
    }

    #[test]
    fn test_undeclared_superclass_is_rejected() {
        let message = hierarchy_error("class A extends Missing { }");
        assert!(message.contains("undeclared"));
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let message = hierarchy_error("class A { } class A { }");
        assert!(message.contains("more than once"));
    }

    #[test]
    fn test_main_class_name_is_reserved() {
        let message = hierarchy_error("class Main { }");
        assert!(message.contains("main class"));
    }

    #[test]
    fn test_extending_main_class_is_undeclared() {
        let message = hierarchy_error("class A extends Main { }");
        assert!(message.contains("undeclared"));
    }
}
