// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Plane-classification input for fragment categorization

use crate::csg::NodeHandle;
use crate::routing::Category;
use ahash::AHashMap;

/// Category of one fragment relative to each brush of its tree.
///
/// Supplied by the geometry layer after plane classification.
pub trait CategoryProvider {
    fn category(&self, brush: NodeHandle) -> Category;
}

impl<F> CategoryProvider for F
where
    F: Fn(NodeHandle) -> Category,
{
    fn category(&self, brush: NodeHandle) -> Category {
        self(brush)
    }
}

/// Explicit per-brush categories for one fragment.
///
/// The originating brush defaults to `Aligned` (the fragment lies on its
/// surface), every other unlisted brush to `Outside`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentCategories {
    origin: NodeHandle,
    categories: AHashMap<NodeHandle, Category>,
}

impl FragmentCategories {
    pub fn new(origin: NodeHandle) -> Self {
        Self {
            origin,
            categories: AHashMap::new(),
        }
    }

    pub fn with(mut self, brush: NodeHandle, category: Category) -> Self {
        self.set(brush, category);
        self
    }

    pub fn set(&mut self, brush: NodeHandle, category: Category) {
        self.categories.insert(brush, category);
    }

    pub fn origin(&self) -> NodeHandle {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl CategoryProvider for FragmentCategories {
    fn category(&self, brush: NodeHandle) -> Category {
        match self.categories.get(&brush) {
            Some(category) => *category,
            None if brush == self.origin => Category::Aligned,
            None => Category::Outside,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_defaults() {
        let origin = NodeHandle::new(1, 0);
        let other = NodeHandle::new(2, 0);
        let listed = NodeHandle::new(3, 0);
        let fragment = FragmentCategories::new(origin).with(listed, Category::Inside);

        assert_eq!(fragment.category(origin), Category::Aligned);
        assert_eq!(fragment.category(other), Category::Outside);
        assert_eq!(fragment.category(listed), Category::Inside);
    }

    #[test]
    fn test_closure_provider() {
        let provider = |brush: NodeHandle| {
            if brush.index() == 0 {
                Category::Inside
            } else {
                Category::ReverseAligned
            }
        };
        assert_eq!(provider.category(NodeHandle::new(0, 4)), Category::Inside);
        assert_eq!(provider.category(NodeHandle::new(5, 0)), Category::ReverseAligned);
    }
}
