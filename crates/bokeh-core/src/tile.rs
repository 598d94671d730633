//! Tile partitioning and the pull-based work queue.
//!
//! An image is cut into [`TILE_SIZE`] square tiles; the last column and row
//! shrink to the remainder. Workers claim tiles from a [`TaskQueue`] in index
//! order, one at a time, until it runs dry. Only the cursor increment is
//! serialized; the tile work itself runs unlocked.

use std::sync::{Mutex, PoisonError};
use std::thread;

use tracing::{debug, trace};

use crate::image::ImageBuffer;

/// Side length of a full tile in pixels.
pub const TILE_SIZE: u32 = 64;

/// A rectangular region of the output image processed as one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlurTask {
    /// Left edge in image coordinates.
    pub x: u32,
    /// Top edge in image coordinates.
    pub y: u32,
    /// Width in pixels, at most [`TILE_SIZE`].
    pub width: u32,
    /// Height in pixels, at most [`TILE_SIZE`].
    pub height: u32,
}

/// Split a `width` x `height` image into tiles, row-major.
///
/// The tiles cover the image exactly once. A dimension that is a multiple of
/// [`TILE_SIZE`] gets no remainder tile.
///
/// # Examples
///
/// ```
/// use bokeh_core::tile::partition;
/// let tasks = partition(65, 65);
/// assert_eq!(tasks.len(), 4);
/// assert_eq!((tasks[3].x, tasks[3].y, tasks[3].width, tasks[3].height), (64, 64, 1, 1));
/// ```
pub fn partition(width: u32, height: u32) -> Vec<BlurTask> {
    let mut tasks = Vec::with_capacity(tile_count(width) * tile_count(height));
    for (y, h) in spans(height) {
        for (x, w) in spans(width) {
            tasks.push(BlurTask {
                x,
                y,
                width: w,
                height: h,
            });
        }
    }
    tasks
}

fn tile_count(len: u32) -> usize {
    len.div_ceil(TILE_SIZE) as usize
}

fn spans(len: u32) -> impl Iterator<Item = (u32, u32)> {
    (0..len)
        .step_by(TILE_SIZE as usize)
        .map(move |start| (start, TILE_SIZE.min(len - start)))
}

/// Exclusive access to the output bytes covered by one [`BlurTask`].
///
/// `rows[n]` is the slice of scanline `task.y + n` spanning the tile's
/// columns.
#[derive(Debug)]
pub struct TileMut<'a> {
    /// The region these rows belong to.
    pub task: BlurTask,
    /// One mutable slice per tile row.
    pub rows: Vec<&'a mut [u8]>,
}

/// Partition `image` and hand out disjoint mutable views of each tile.
///
/// The result is in the same order as [`partition`].
pub fn partition_mut(image: &mut ImageBuffer) -> Vec<TileMut<'_>> {
    let tiles_x = tile_count(image.width());
    let row_stride = image.row_stride();
    let tile_bytes = TILE_SIZE as usize * image.pixel_stride();

    let mut tiles: Vec<TileMut<'_>> = partition(image.width(), image.height())
        .into_iter()
        .map(|task| TileMut {
            task,
            rows: Vec::with_capacity(task.height as usize),
        })
        .collect();

    for (y, row) in image.as_bytes_mut().chunks_exact_mut(row_stride).enumerate() {
        let band = y / TILE_SIZE as usize;
        for (tx, cell) in row.chunks_mut(tile_bytes).enumerate() {
            tiles[band * tiles_x + tx].rows.push(cell);
        }
    }
    tiles
}

/// A fixed list of work items claimed in order by any number of workers.
///
/// The cursor only moves forward and every index is handed out at most
/// once. There is no reset; a new run needs a new queue.
#[derive(Debug)]
pub struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    total: usize,
}

#[derive(Debug)]
struct QueueState<T> {
    items: Vec<Option<T>>,
    cursor: usize,
}

impl<T> TaskQueue<T> {
    /// Build a queue over `items`; the first claim returns index 0.
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        TaskQueue {
            state: Mutex::new(QueueState {
                items: items.into_iter().map(Some).collect(),
                cursor: 0,
            }),
            total,
        }
    }

    /// Take the next unclaimed item, or `None` once all have been handed out.
    pub fn claim(&self) -> Option<(usize, T)> {
        // The cursor is consistent even if a worker panicked while holding
        // the lock, so a poisoned mutex is still usable.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.cursor >= self.total {
            return None;
        }
        let index = state.cursor;
        state.cursor += 1;
        state.items[index].take().map(|item| (index, item))
    }

    /// Number of items the queue was built with.
    pub fn len(&self) -> usize {
        self.total
    }

    /// Whether the queue was built empty.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of items handed out so far.
    pub fn claimed(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cursor
    }
}

/// Drain `queue` with `threads` scoped worker threads.
///
/// Each worker loops claiming an item and passing it to `work` until the
/// queue is empty. Returns once every worker has been joined.
///
/// # Panics
///
/// Panics if `threads` is zero, or re-raises a panic from `work`.
pub fn run_workers<T, F>(queue: &TaskQueue<T>, threads: usize, work: F)
where
    T: Send,
    F: Fn(T) + Sync,
{
    assert!(threads > 0, "at least one worker thread is required");

    debug!(tasks = queue.len(), threads, "launching task workers");
    thread::scope(|scope| {
        for worker in 0..threads {
            let work = &work;
            scope.spawn(move || {
                let mut processed = 0usize;
                while let Some((index, item)) = queue.claim() {
                    trace!(worker, index, "claimed task");
                    work(item);
                    processed += 1;
                }
                debug!(worker, processed, "worker finished");
            });
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Bitdepth;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn assert_exact_cover(width: u32, height: u32) {
        let mut hits = vec![0u8; (width * height) as usize];
        for t in partition(width, height) {
            assert!(t.width >= 1 && t.width <= TILE_SIZE);
            assert!(t.height >= 1 && t.height <= TILE_SIZE);
            for y in t.y..t.y + t.height {
                for x in t.x..t.x + t.width {
                    hits[(y * width + x) as usize] += 1;
                }
            }
        }
        assert!(
            hits.iter().all(|&h| h == 1),
            "{width}x{height} not covered exactly once"
        );
    }

    #[test]
    fn test_partition_covers_exactly() {
        for (w, h) in [(1, 1), (63, 1), (64, 64), (65, 65), (128, 100), (200, 129), (1, 300)] {
            assert_exact_cover(w, h);
        }
    }

    #[test]
    fn test_partition_65x65() {
        let tasks = partition(65, 65);
        let expected = [
            BlurTask { x: 0, y: 0, width: 64, height: 64 },
            BlurTask { x: 64, y: 0, width: 1, height: 64 },
            BlurTask { x: 0, y: 64, width: 64, height: 1 },
            BlurTask { x: 64, y: 64, width: 1, height: 1 },
        ];
        assert_eq!(tasks, expected);
    }

    #[test]
    fn test_partition_multiple_of_tile() {
        let tasks = partition(128, 64);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.width == 64 && t.height == 64));
    }

    #[test]
    fn test_partition_mut_matches_partition() {
        let mut img = ImageBuffer::new(130, 70, Bitdepth::Bgr24).unwrap();
        let tasks = partition(130, 70);
        let tiles = partition_mut(&mut img);
        assert_eq!(tiles.len(), tasks.len());
        for (tile, task) in tiles.iter().zip(&tasks) {
            assert_eq!(tile.task, *task);
            assert_eq!(tile.rows.len(), task.height as usize);
            for row in &tile.rows {
                assert_eq!(row.len(), task.width as usize * 3);
            }
        }
    }

    #[test]
    fn test_partition_mut_writes_land_in_place() {
        let mut img = ImageBuffer::new(70, 66, Bitdepth::Bgr24).unwrap();
        for mut tile in partition_mut(&mut img) {
            let t = tile.task;
            for (dy, row) in tile.rows.iter_mut().enumerate() {
                for dx in 0..t.width as usize {
                    row[dx * 3] = ((t.x as usize + dx) % 256) as u8;
                    row[dx * 3 + 1] = ((t.y as usize + dy) % 256) as u8;
                }
            }
        }
        for y in 0..66 {
            for x in 0..70 {
                let p = img.pixel(x, y).unwrap();
                assert_eq!((p[0], p[1]), (x as u8, y as u8));
            }
        }
    }

    #[test]
    fn test_queue_claims_in_order_once() {
        let queue = TaskQueue::new(vec!['a', 'b', 'c']);
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.claim(), Some((0, 'a')));
        assert_eq!(queue.claim(), Some((1, 'b')));
        assert_eq!(queue.claimed(), 2);
        assert_eq!(queue.claim(), Some((2, 'c')));
        assert_eq!(queue.claim(), None);
        assert_eq!(queue.claim(), None);
        assert_eq!(queue.claimed(), 3);
    }

    #[test]
    fn test_empty_queue() {
        let queue: TaskQueue<u32> = TaskQueue::new(Vec::new());
        assert!(queue.is_empty());
        assert_eq!(queue.claim(), None);
    }

    #[test]
    fn test_run_workers_processes_every_item_once() {
        let seen: Vec<AtomicUsize> = (0..500).map(|_| AtomicUsize::new(0)).collect();
        let queue = TaskQueue::new((0..500usize).collect());
        run_workers(&queue, 4, |i| {
            seen[i].fetch_add(1, Ordering::Relaxed);
        });
        assert!(seen.iter().all(|c| c.load(Ordering::Relaxed) == 1));
        assert_eq!(queue.claimed(), 500);
    }

    #[test]
    #[should_panic(expected = "at least one worker thread")]
    fn test_run_workers_zero_threads() {
        let queue = TaskQueue::new(vec![1]);
        run_workers(&queue, 0, |_| {});
    }
}
