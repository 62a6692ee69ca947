//! Integer geometry shared by the rasterizer, the drawable model and the backbuffer.

/// A point in drawable coordinates (origin top-left, y down).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle. `x`/`y` is the top-left corner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a `width` x `height` area at the origin.
    pub const fn sized(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width as i32)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height as i32)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && y >= self.y && x < self.right() && y < self.bottom()
    }

    /// Builds a rectangle from exclusive edges, returning an empty one when they cross.
    pub fn from_edges(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        if x1 <= x0 || y1 <= y0 {
            return Self::new(x0, y0, 0, 0);
        }
        Self::new(x0, y0, (x1 - x0) as u32, (y1 - y0) as u32)
    }

    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let r = Rect::from_edges(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        );
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }

    /// Smallest rectangle covering both. Empty rectangles are ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn translate(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// The parts of `self` not covered by `hole`, as at most four disjoint bands.
    pub fn subtract(&self, hole: &Rect) -> Vec<Rect> {
        let Some(hole) = self.intersect(hole) else {
            return vec![*self];
        };

        let mut out = Vec::with_capacity(4);
        let bands = [
            Rect::from_edges(self.x, self.y, self.right(), hole.y),
            Rect::from_edges(self.x, hole.bottom(), self.right(), self.bottom()),
            Rect::from_edges(self.x, hole.y, hole.x, hole.bottom()),
            Rect::from_edges(hole.right(), hole.y, self.right(), hole.bottom()),
        ];
        for band in bands {
            if !band.is_empty() {
                out.push(band);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_and_union() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersect(&b), Some(Rect::new(5, 5, 5, 5)));
        assert_eq!(a.union(&b), Rect::new(0, 0, 15, 15));
        assert_eq!(a.intersect(&Rect::new(20, 20, 1, 1)), None);
        assert_eq!(Rect::default().union(&b), b);
    }

    #[test]
    fn subtract_leaves_disjoint_bands() {
        let outer = Rect::new(0, 0, 10, 10);
        let parts = outer.subtract(&Rect::new(2, 2, 4, 4));
        let covered: u64 = parts.iter().map(|r| r.area()).sum();
        assert_eq!(covered, 100 - 16);
        for (i, a) in parts.iter().enumerate() {
            for b in parts.iter().skip(i + 1) {
                assert!(a.intersect(b).is_none());
            }
        }

        assert_eq!(outer.subtract(&Rect::new(50, 50, 2, 2)), vec![outer]);
        assert!(outer.subtract(&Rect::new(-1, -1, 20, 20)).is_empty());
    }
}
