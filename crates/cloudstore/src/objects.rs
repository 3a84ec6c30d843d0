//! Name-ordered collections of object handles.

use std::ops::Index;
use std::slice;
use std::vec;

use crate::object::Object;

/// An ordered collection of object handles, as returned by listings.
///
/// Listings always arrive sorted ascending by name.
#[derive(Debug, Default)]
pub struct Objects(Vec<Object>);

impl Objects {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Object> {
        self.0.iter()
    }

    pub fn iter_mut(&mut self) -> slice::IterMut<'_, Object> {
        self.0.iter_mut()
    }

    pub fn get(&self, index: usize) -> Option<&Object> {
        self.0.get(index)
    }

    /// Find a handle by exact name.
    pub fn find(&self, name: &str) -> Option<&Object> {
        self.0.iter().find(|o| o.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(Object::name).collect()
    }

    pub fn push(&mut self, object: Object) {
        self.0.push(object);
    }

    /// Restore ascending name order after pushes.
    pub fn sort(&mut self) {
        self.0.sort_by(|a, b| a.name().cmp(b.name()));
    }

    pub fn into_vec(self) -> Vec<Object> {
        self.0
    }
}

impl Index<usize> for Objects {
    type Output = Object;

    fn index(&self, index: usize) -> &Object {
        &self.0[index]
    }
}

impl From<Vec<Object>> for Objects {
    fn from(mut objects: Vec<Object>) -> Self {
        objects.sort_by(|a, b| a.name().cmp(b.name()));
        Self(objects)
    }
}

impl FromIterator<Object> for Objects {
    fn from_iter<I: IntoIterator<Item = Object>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl IntoIterator for Objects {
    type Item = Object;
    type IntoIter = vec::IntoIter<Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Objects {
    type Item = &'a Object;
    type IntoIter = slice::Iter<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a mut Objects {
    type Item = &'a mut Object;
    type IntoIter = slice::IterMut<'a, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter_mut()
    }
}
