//! Entry identity: the registry partition an entry lives in and its fully
//! qualified id.
//!
//! A [`Category`] is keyed by `TypeId`, the same way the registry storage is
//! keyed by type. Two entries may share a name as long as their categories
//! differ; such entries are *siblings*, not collisions.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A registry partition, identified by a Rust type.
///
/// The type itself is never instantiated; it only serves as a tag.
///
/// ```rust
/// use deferred_registry::Category;
///
/// struct Item;
/// struct Block;
///
/// assert_eq!(Category::of::<Item>(), Category::of::<Item>());
/// assert_ne!(Category::of::<Item>(), Category::of::<Block>());
/// ```
#[derive(Clone, Copy)]
pub struct Category {
    type_id: TypeId,
    type_name: &'static str,
}

impl Category {
    /// The category tagged by `R`.
    pub fn of<R: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<R>(),
            type_name: std::any::type_name::<R>(),
        }
    }

    /// Full type name of the tag, e.g. `"my_mod::Item"`.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The tag's type name with every path shortened to its last segment,
    /// e.g. `"Vec<Item>"` for `alloc::vec::Vec<my_mod::Item>`.
    pub fn short_name(&self) -> String {
        let mut short = String::with_capacity(self.type_name.len());
        let mut start = 0;
        for (index, c) in self.type_name.char_indices() {
            if !(c.is_alphanumeric() || c == '_' || c == ':') {
                short.push_str(last_segment(&self.type_name[start..index]));
                short.push(c);
                start = index + c.len_utf8();
            }
        }
        short.push_str(last_segment(&self.type_name[start..]));
        short
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for Category {}

impl Hash for Category {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Category({})", self.type_name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// Identity of a registry entry: `namespace:name` inside one category.
///
/// Cheap to clone; the strings are shared.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EntryId {
    namespace: Arc<str>,
    name: Arc<str>,
    category: Category,
}

impl EntryId {
    pub fn new(
        namespace: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        category: Category,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            category,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// The id of the entry with the same name in another category.
    pub fn sibling(&self, category: Category) -> Self {
        Self {
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            category,
        }
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.namespace, self.name, self.category)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Item;
    struct Block;

    #[test]
    fn test_category_identity() {
        assert_eq!(Category::of::<Item>(), Category::of::<Item>());
        assert_ne!(Category::of::<Item>(), Category::of::<Block>());
    }

    #[test]
    fn test_category_names() {
        let category = Category::of::<Item>();
        assert!(category.type_name().ends_with("::Item"));
        assert_eq!(category.short_name(), "Item");
        assert_eq!(category.to_string(), "Item");
    }

    #[test]
    fn test_generic_category_names() {
        assert_eq!(Category::of::<Vec<Item>>().to_string(), "Vec<Item>");
        assert_eq!(
            Category::of::<Option<Box<Block>>>().short_name(),
            "Option<Box<Block>>"
        );
        assert_eq!(Category::of::<(Item, [Block; 2])>().short_name(), "(Item, [Block; 2])");
        assert_eq!(Category::of::<u32>().short_name(), "u32");
    }

    #[test]
    fn test_entry_id_display() {
        let id = EntryId::new("demo", "widget", Category::of::<Item>());
        assert_eq!(id.to_string(), "demo:widget");
        assert_eq!(format!("{:?}", id), "demo:widget (Item)");
    }

    #[test]
    fn test_same_name_different_category_is_distinct() {
        let item = EntryId::new("demo", "widget", Category::of::<Item>());
        let block = item.sibling(Category::of::<Block>());

        assert_ne!(item, block);
        assert_eq!(block.name(), "widget");
        assert_eq!(block.namespace(), "demo");

        let set: HashSet<EntryId> = [item.clone(), block, item].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
