//! Skyline bin packing.
//!
//! The packer tracks the upper silhouette of everything placed so far as a
//! linked list of segments, each spanning from its `x` to the next
//! segment's `x` at height `y`. Segments live in a fixed arena; unused ones
//! sit on a free list.

use std::cmp::Reverse;

/// How a position is chosen among the skyline segments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Heuristic {
    /// Lowest resulting top edge, leftmost first.
    #[default]
    BottomLeft,
    /// Lowest top edge, then least wasted area beneath the rectangle. Also
    /// tries aligning the rectangle's right side to each segment start.
    BestFit,
}

/// A rectangle to place, and where it ended up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PackRect {
    /// Caller data, untouched by the packer.
    pub id: usize,
    pub w: u32,
    pub h: u32,
    pub x: u32,
    pub y: u32,
    pub was_packed: bool,
}

impl PackRect {
    /// Coordinate given to rectangles that did not fit.
    pub const UNPACKED: u32 = u32::MAX;

    pub fn new(id: usize, w: u32, h: u32) -> Self {
        Self {
            id,
            w,
            h,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Node {
    x: u32,
    y: u32,
    next: Option<usize>,
}

/// Where the link pointing at a node is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Link {
    Head,
    After(usize),
}

#[derive(Clone, Copy, Debug)]
struct Placement {
    x: u32,
    y: u32,
    /// Link to `node`, which is replaced or split by the new segment.
    prev: Link,
    node: usize,
}

/// Height of the sentinel segment closing the skyline.
const SENTINEL_Y: u32 = 1 << 30;

/// Skyline packing state for one target area.
#[derive(Clone, Debug)]
pub struct Skyline {
    width: u32,
    height: u32,
    align: u32,
    heuristic: Heuristic,
    num_nodes: usize,
    nodes: Vec<Node>,
    active_head: usize,
    free_head: Option<usize>,
}

impl Skyline {
    /// A packer for a `width` x `height` area with `num_nodes` segments of
    /// storage.
    ///
    /// With fewer nodes than `width`, rectangle widths are rounded up to a
    /// multiple of `ceil(width / num_nodes)` so the nodes cannot run out.
    pub fn new(width: u32, height: u32, num_nodes: usize) -> Self {
        let mut nodes: Vec<Node> = (0..num_nodes)
            .map(|i| Node {
                x: 0,
                y: 0,
                next: (i + 1 < num_nodes).then_some(i + 1),
            })
            .collect();
        let head = num_nodes;
        let sentinel = num_nodes + 1;
        nodes.push(Node {
            x: 0,
            y: 0,
            next: Some(sentinel),
        });
        nodes.push(Node {
            x: width,
            y: SENTINEL_Y,
            next: None,
        });

        let mut skyline = Self {
            width,
            height,
            align: 1,
            heuristic: Heuristic::default(),
            num_nodes,
            nodes,
            active_head: head,
            free_head: (num_nodes > 0).then_some(0),
        };
        skyline.set_allow_out_of_mem(false);
        skyline
    }

    /// Lets every node be used at exact widths, at the risk of running out
    /// of nodes and failing a pack that would otherwise fit.
    pub fn set_allow_out_of_mem(&mut self, allow: bool) {
        self.align = if allow || self.num_nodes == 0 {
            1
        } else {
            let nodes = u32::try_from(self.num_nodes).unwrap_or(u32::MAX);
            self.width.div_ceil(nodes).max(1)
        };
    }

    pub fn set_heuristic(&mut self, heuristic: Heuristic) {
        self.heuristic = heuristic;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Lowest level at which a rectangle of `width` starting at `x0` rests,
    /// beginning the scan at segment `first`, and the area wasted below it.
    fn find_min_y(&self, first: usize, x0: u32, width: u32) -> (u32, u64) {
        let x1 = x0.saturating_add(width);
        let mut node = first;
        let mut min_y = 0u32;
        let mut waste = 0u64;
        let mut visited_width = 0u32;

        while self.nodes[node].x < x1 {
            let Some(next) = self.nodes[node].next else {
                break;
            };
            let (nx, ny, next_x) = (self.nodes[node].x, self.nodes[node].y, self.nodes[next].x);
            if ny > min_y {
                // Everything visited so far now sits below the new level.
                waste += visited_width as u64 * (ny - min_y) as u64;
                min_y = ny;
                visited_width += if nx < x0 { next_x - x0 } else { next_x - nx };
            } else {
                let under_width = (next_x - nx).min(width - visited_width.min(width));
                waste += under_width as u64 * (min_y - ny) as u64;
                visited_width += under_width;
            }
            node = next;
        }
        (min_y, waste)
    }

    fn find_best_pos(&self, width: u32, height: u32) -> Option<Placement> {
        let width = width.div_ceil(self.align).checked_mul(self.align)?;
        if width > self.width || height > self.height {
            return None;
        }

        let mut best: Option<(Link, usize)> = None;
        let mut best_y = SENTINEL_Y;
        let mut best_waste = u64::from(SENTINEL_Y);

        let mut prev = Link::Head;
        let mut node = self.active_head;
        while self.nodes[node].x.checked_add(width).is_some_and(|right| right <= self.width) {
            let (y, waste) = self.find_min_y(node, self.nodes[node].x, width);
            match self.heuristic {
                Heuristic::BottomLeft => {
                    if y < best_y {
                        best_y = y;
                        best = Some((prev, node));
                    }
                }
                Heuristic::BestFit => {
                    if self.fits_below_top(y, height) && (y < best_y || (y == best_y && waste < best_waste)) {
                        best_y = y;
                        best_waste = waste;
                        best = Some((prev, node));
                    }
                }
            }
            let Some(next) = self.nodes[node].next else {
                break;
            };
            prev = Link::After(node);
            node = next;
        }

        let mut best_x = best.map_or(0, |(_, n)| self.nodes[n].x);

        if self.heuristic == Heuristic::BestFit {
            let mut tail = Some(self.active_head);
            while let Some(t) = tail {
                if self.nodes[t].x >= width {
                    break;
                }
                tail = self.nodes[t].next;
            }

            let mut prev = Link::Head;
            let mut node = self.active_head;
            while let Some(t) = tail {
                let xpos = self.nodes[t].x - width;
                // Segment containing xpos.
                while let Some(next) = self.nodes[node].next {
                    if self.nodes[next].x > xpos {
                        break;
                    }
                    prev = Link::After(node);
                    node = next;
                }
                let (y, waste) = self.find_min_y(node, xpos, width);
                if self.fits_below_top(y, height)
                    && y <= best_y
                    && (y < best_y || waste < best_waste || (waste == best_waste && xpos < best_x))
                {
                    best_x = xpos;
                    best_y = y;
                    best_waste = waste;
                    best = Some((prev, node));
                }
                tail = self.nodes[t].next;
            }
        }

        best.map(|(prev, node)| Placement {
            x: best_x,
            y: best_y,
            prev,
            node,
        })
    }

    fn fits_below_top(&self, y: u32, height: u32) -> bool {
        y.checked_add(height).is_some_and(|top| top <= self.height)
    }

    fn set_link(&mut self, link: Link, target: usize) {
        match link {
            Link::Head => self.active_head = target,
            Link::After(i) => self.nodes[i].next = Some(target),
        }
    }

    /// Places one rectangle, returning its position.
    fn pack_rectangle(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        let p = self.find_best_pos(width, height)?;
        if !self.fits_below_top(p.y, height) {
            return None;
        }
        let new = self.free_head?;
        let splits = self.nodes[p.node].x < p.x;
        let mut cur = if splits { self.nodes[p.node].next? } else { p.node };

        self.free_head = self.nodes[new].next;
        self.nodes[new].x = p.x;
        self.nodes[new].y = p.y + height;
        if splits {
            // The old segment keeps its left part.
            self.nodes[p.node].next = Some(new);
        } else {
            self.set_link(p.prev, new);
        }

        // Release segments now hidden under the new one.
        let right = p.x.checked_add(width)?;
        while let Some(next) = self.nodes[cur].next {
            if self.nodes[next].x > right {
                break;
            }
            self.nodes[cur].next = self.free_head;
            self.free_head = Some(cur);
            cur = next;
        }
        self.nodes[new].next = Some(cur);
        if self.nodes[cur].x < right {
            self.nodes[cur].x = right;
        }
        Some((p.x, p.y))
    }

    /// Packs `rects` in place, largest height first.
    ///
    /// Returns whether every rectangle was packed. Rectangles that did not
    /// fit get [`PackRect::UNPACKED`] coordinates and `was_packed == false`.
    /// Zero-area rectangles are placed at the origin.
    pub fn pack_rects(&mut self, rects: &mut [PackRect]) -> bool {
        let mut order: Vec<usize> = (0..rects.len()).collect();
        order.sort_by_key(|&i| (Reverse(rects[i].h), Reverse(rects[i].w)));

        for i in order {
            let rect = &mut rects[i];
            let position = if rect.w == 0 || rect.h == 0 {
                Some((0, 0))
            } else {
                self.pack_rectangle(rect.w, rect.h)
            };
            (rect.x, rect.y) = position.unwrap_or((PackRect::UNPACKED, PackRect::UNPACKED));
            rect.was_packed = position.is_some();
        }
        rects.iter().all(|r| r.was_packed)
    }

    /// The skyline as (x, y) segment starts, sentinel excluded.
    pub(crate) fn segments(&self) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        let mut cur = Some(self.active_head);
        while let Some(i) = cur {
            let node = self.nodes[i];
            if node.next.is_none() {
                break;
            }
            out.push((node.x, node.y));
            cur = node.next;
        }
        out
    }
}
