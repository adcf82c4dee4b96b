//! Object layout and virtual tables
//!
//! An [`ObjectVTable`] records, per class, the ordered field list (which
//! fixes byte offsets inside an object) and the ordered method list (which
//! fixes vtable slots). Inherited members come first; an override replaces
//! the inherited slot in place so that slot indices agree across a class
//! and all its subclasses.

use indexmap::IndexMap;

use crate::ast::{ClassDecl, MethodDecl, Program, Type};
use crate::error::{CompileError, Result};
use crate::symbol_table::{SymbolItem, SymbolKind, SymbolTable};

/// Bytes reserved at the start of every object for the vtable pointer
pub const HEADER_SIZE: usize = 8;

/// Storage size of a field of the given type
pub fn type_size(ty: &Type) -> usize {
    match ty {
        Type::Boolean => 1,
        Type::Int => 4,
        Type::IntArray | Type::Class(_) => 8,
    }
}

/// Signature of a method as it appears in a vtable slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSignature {
    /// `Class.method` of the implementing class
    pub qualified_name: String,
    pub ret: Type,
    pub formals: Vec<(String, Type)>,
}

impl MethodSignature {
    pub fn from_decl(class_name: &str, method: &MethodDecl) -> Self {
        Self {
            qualified_name: format!("{}.{}", class_name, method.name),
            ret: method.return_type.clone(),
            formals: method
                .formals
                .iter()
                .map(|f| (f.name.clone(), f.ty.clone()))
                .collect(),
        }
    }

    pub fn formal_types(&self) -> impl Iterator<Item = &Type> {
        self.formals.iter().map(|(_, ty)| ty)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectVTable {
    class_name: String,
    super_name: Option<String>,
    fields: IndexMap<String, Type>,
    methods: IndexMap<String, MethodSignature>,
}

impl ObjectVTable {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            super_name: None,
            fields: IndexMap::new(),
            methods: IndexMap::new(),
        }
    }

    /// Start a subclass layout from a copy of the parent's
    pub fn inherit(class_name: impl Into<String>, parent: &ObjectVTable) -> Self {
        Self {
            class_name: class_name.into(),
            super_name: Some(parent.class_name.clone()),
            fields: parent.fields.clone(),
            methods: parent.methods.clone(),
        }
    }

    /// Layout for `class`, given the already-built layout of its superclass
    pub fn for_class(class: &ClassDecl, parent: Option<&ObjectVTable>) -> Self {
        let mut vtable = match parent {
            Some(parent) => Self::inherit(&class.name, parent),
            None => Self::new(&class.name),
        };
        for field in &class.fields {
            vtable.add_field(&field.name, field.ty.clone());
        }
        for method in &class.methods {
            vtable.add_or_update_method(&method.name, MethodSignature::from_decl(&class.name, method));
        }
        vtable
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    pub fn add_field(&mut self, name: &str, ty: Type) {
        self.fields.insert(name.to_string(), ty);
    }

    /// Insert a new slot, or replace an inherited one without moving it
    pub fn add_or_update_method(&mut self, name: &str, signature: MethodSignature) {
        self.methods.insert(name.to_string(), signature);
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.fields.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    pub fn field_type(&self, name: &str) -> Option<&Type> {
        self.fields.get(name)
    }

    /// Byte offset of a field from the start of the object
    pub fn field_offset(&self, name: &str) -> Option<usize> {
        let index = self.fields.get_index_of(name)?;
        Some(HEADER_SIZE + self.fields.values().take(index).map(type_size).sum::<usize>())
    }

    /// Size to allocate for an instance, header included
    pub fn physical_size(&self) -> usize {
        HEADER_SIZE + self.fields.values().map(type_size).sum::<usize>()
    }

    pub fn methods(&self) -> impl Iterator<Item = (&str, &MethodSignature)> {
        self.methods.iter().map(|(name, sig)| (name.as_str(), sig))
    }

    pub fn method(&self, name: &str) -> Option<&MethodSignature> {
        self.methods.get(name)
    }

    pub fn method_slot(&self, name: &str) -> Option<usize> {
        self.methods.get_index_of(name)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

/// Layout and declaration of one class
#[derive(Debug)]
pub struct ClassEntry<'a> {
    pub vtable: ObjectVTable,
    pub decl: &'a ClassDecl,
}

/// Registry from class name to layout, built once per compilation
#[derive(Debug, Default)]
pub struct ClassInfo<'a> {
    classes: IndexMap<String, ClassEntry<'a>>,
}

impl<'a> ClassInfo<'a> {
    /// Collect every class layout from the class items of the root scope
    pub fn from_symbols(program: &'a Program, symbols: &SymbolTable) -> Result<Self> {
        let mut classes = IndexMap::new();
        for class in &program.classes {
            match symbols.lookup(symbols.root(), &class.name, SymbolKind::Class) {
                Some(SymbolItem::Class { vtable, .. }) => {
                    classes.insert(
                        class.name.clone(),
                        ClassEntry {
                            vtable: vtable.clone(),
                            decl: class,
                        },
                    );
                }
                _ => {
                    return Err(CompileError::codegen(format!(
                        "Class '{}' missing from the symbol table",
                        class.name
                    )));
                }
            }
        }
        Ok(Self { classes })
    }

    pub fn get(&self, class_name: &str) -> Option<&ClassEntry<'a>> {
        self.classes.get(class_name)
    }

    pub fn vtable(&self, class_name: &str) -> Option<&ObjectVTable> {
        self.get(class_name).map(|entry| &entry.vtable)
    }

    pub fn physical_size(&self, class_name: &str) -> Option<usize> {
        self.vtable(class_name).map(ObjectVTable::physical_size)
    }

    /// Entries in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ClassEntry<'a>)> {
        self.classes.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(qualified: &str, ret: Type) -> MethodSignature {
        MethodSignature {
            qualified_name: qualified.to_string(),
            ret,
            formals: Vec::new(),
        }
    }

    fn animal() -> ObjectVTable {
        let mut vtable = ObjectVTable::new("Animal");
        vtable.add_field("legs", Type::Int);
        vtable.add_field("alive", Type::Boolean);
        vtable.add_or_update_method("speak", signature("Animal.speak", Type::Int));
        vtable.add_or_update_method("eat", signature("Animal.eat", Type::Int));
        vtable
    }

    #[test]
    fn test_override_keeps_slot() {
        let base = animal();
        let mut dog = ObjectVTable::inherit("Dog", &base);
        dog.add_or_update_method("fetch", signature("Dog.fetch", Type::Boolean));
        dog.add_or_update_method("eat", signature("Dog.eat", Type::Int));

        assert_eq!(base.method_slot("eat"), Some(1));
        assert_eq!(dog.method_slot("eat"), Some(1));
        assert_eq!(dog.method_slot("fetch"), Some(2));
        assert_eq!(dog.method("eat").unwrap().qualified_name, "Dog.eat");
        assert_eq!(dog.method("speak").unwrap().qualified_name, "Animal.speak");
        assert_eq!(dog.method_count(), 3);
        assert_eq!(dog.super_name(), Some("Animal"));
    }

    #[test]
    fn test_field_offsets() {
        let base = animal();
        let mut dog = ObjectVTable::inherit("Dog", &base);
        dog.add_field("owner", Type::Class("Person".into()));
        dog.add_field("tricks", Type::IntArray);

        assert_eq!(dog.field_offset("legs"), Some(8));
        assert_eq!(dog.field_offset("alive"), Some(12));
        assert_eq!(dog.field_offset("owner"), Some(13));
        assert_eq!(dog.field_offset("tricks"), Some(21));
        assert_eq!(dog.field_offset("missing"), None);
        assert_eq!(base.physical_size(), 13);
        assert_eq!(dog.physical_size(), 29);
    }

    #[test]
    fn test_offsets_are_monotonic_and_disjoint() {
        let mut vtable = ObjectVTable::new("C");
        for (i, ty) in [Type::Boolean, Type::Int, Type::IntArray, Type::Boolean, Type::Class("C".into())]
            .into_iter()
            .enumerate()
        {
            vtable.add_field(&format!("f{}", i), ty);
        }

        let fields: Vec<_> = vtable
            .fields()
            .map(|(name, ty)| (vtable.field_offset(name).unwrap(), type_size(ty)))
            .collect();
        assert_eq!(fields[0].0, HEADER_SIZE);
        for pair in fields.windows(2) {
            let (offset, size) = pair[0];
            assert_eq!(pair[1].0, offset + size);
        }
        let (last_offset, last_size) = fields[fields.len() - 1];
        assert_eq!(vtable.physical_size(), last_offset + last_size);
    }

    #[test]
    fn test_empty_class_is_header_only() {
        let vtable = ObjectVTable::new("Empty");
        assert_eq!(vtable.physical_size(), HEADER_SIZE);
        assert_eq!(vtable.method_count(), 0);
    }
}
