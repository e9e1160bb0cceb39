use std::sync::Arc;

/// One scope in the sizing chain: an offset plus the dimensions and font
/// size available to relative units resolved inside it.
///
/// Contexts form an immutable parent chain. Deriving a child never touches
/// the ancestors; the child just links back to them, so chains are cheap to
/// fork and safe to share across threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeContext {
    node: Arc<Node>,
}

#[derive(Debug, PartialEq, Eq)]
struct Node {
    x: i32,
    y: i32,
    width: i32,
    height: i32,
    font_size: i32,
    parent: Option<Arc<Node>>,
}

impl SizeContext {
    /// The chain head: the full card surface at origin.
    pub fn for_root(width: i32, height: i32, font_size: i32) -> Self {
        Self {
            node: Arc::new(Node {
                x: 0,
                y: 0,
                width,
                height,
                font_size,
                parent: None,
            }),
        }
    }

    /// Derives a child context offset inside this one. Missing dimensions
    /// default to whatever remains after the offset. The font size is
    /// inherited.
    pub fn derive(
        &self,
        x_offset: i32,
        y_offset: i32,
        width: Option<i32>,
        height: Option<i32>,
    ) -> SizeContext {
        SizeContext {
            node: Arc::new(Node {
                x: x_offset,
                y: y_offset,
                width: width.unwrap_or(self.width() - x_offset),
                height: height.unwrap_or(self.height() - y_offset),
                font_size: self.font_size(),
                parent: Some(Arc::clone(&self.node)),
            }),
        }
    }

    pub fn x(&self) -> i32 {
        self.node.x
    }

    pub fn y(&self) -> i32 {
        self.node.y
    }

    pub fn width(&self) -> i32 {
        self.node.width
    }

    pub fn height(&self) -> i32 {
        self.node.height
    }

    pub fn font_size(&self) -> i32 {
        self.node.font_size
    }

    pub fn is_root(&self) -> bool {
        self.node.parent.is_none()
    }

    /// Width of the chain head (the card itself).
    pub fn root_width(&self) -> i32 {
        self.root_node().width
    }

    /// Height of the chain head.
    pub fn root_height(&self) -> i32 {
        self.root_node().height
    }

    fn root_node(&self) -> &Node {
        let mut node = &*self.node;
        while let Some(parent) = &node.parent {
            node = parent;
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn derive_defaults_to_remaining_space() {
        let root = SizeContext::for_root(200, 100, 15);
        let child = root.derive(20, 10, None, None);
        assert_eq!(child.width(), 180);
        assert_eq!(child.height(), 90);
        assert_eq!(child.font_size(), 15);
    }

    #[test]
    fn derive_keeps_explicit_dimensions() {
        let root = SizeContext::for_root(200, 100, 15);
        let child = root.derive(0, 0, Some(100), Some(50));
        assert_eq!(child.width(), 100);
        assert_eq!(child.height(), 50);
    }

    #[test]
    fn root_is_reachable_through_the_chain() {
        let root = SizeContext::for_root(200, 100, 15);
        let leaf = root.derive(10, 10, None, None).derive(5, 5, Some(30), Some(30));
        assert_eq!(leaf.root_width(), 200);
        assert_eq!(leaf.root_height(), 100);
        assert!(!leaf.is_root());
        assert!(root.is_root());
    }

    #[test]
    fn deriving_does_not_mutate_the_parent() {
        let root = SizeContext::for_root(200, 100, 15);
        let before = root.clone();
        let _child = root.derive(50, 50, None, None);
        assert_eq!(root, before);
    }
}
