use super::*;
use crate::foundation::core::{Rect, Rgba8, Size};
use crate::render::executor::{InlineExecutor, TileJob};
use crate::shapes::{Page, Shape};
use std::sync::atomic::{AtomicUsize, Ordering};

const RED: Rgba8 = Rgba8::opaque(255, 0, 0);
const GREEN: Rgba8 = Rgba8::opaque(0, 255, 0);

#[derive(Default)]
struct CountingInline {
    jobs: AtomicUsize,
}

impl TileExecutor for CountingInline {
    fn execute(&self, job: TileJob) {
        self.jobs.fetch_add(1, Ordering::SeqCst);
        job();
    }
}

fn inline_renderer(policy: CancelPolicy) -> (Renderer, Arc<CountingInline>) {
    let ex = Arc::new(CountingInline::default());
    let r = Renderer::with_parts(policy, ex.clone(), Arc::new(BufferPool::default()));
    (r, ex)
}

fn block(id: u64, shape: &Arc<Shape>) -> CacheableBlock {
    CacheableBlock::new(BlockId(id), vec![shape.clone() as Arc<dyn Drawable>])
}

fn page() -> Page {
    Page::new(Size::new(20.0, 20.0), 1.0)
}

fn collect(r: &Renderer) -> Arc<Mutex<Vec<RenderComplete>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    r.add_listener(move |e: &RenderComplete| -> anyhow::Result<()> {
        sink.lock().push(e.clone());
        Ok(())
    });
    seen
}

#[test]
fn options_parse_with_defaults() {
    let opts = RendererOpts::from_json_str(r#"{ "cancel_policy": "no_cancel" }"#).unwrap();
    assert_eq!(opts.cancel_policy, CancelPolicy::NoCancel);
    assert_eq!(opts.worker_threads, None);
    assert_eq!(opts.buffer_pool, BufferPoolOpts::default());

    let opts =
        RendererOpts::from_json_str(r#"{ "worker_threads": 2, "buffer_pool": { "max_pool_bytes": 0 } }"#)
            .unwrap();
    assert_eq!(opts.worker_threads, Some(2));
    assert_eq!(opts.buffer_pool.max_pool_bytes, 0);
    assert_eq!(opts.buffer_pool.max_buffers_per_bucket, 8);
}

#[test]
fn options_reject_unknown_fields_and_policies() {
    let e = RendererOpts::from_json_str(r#"{ "threads": 2 }"#).unwrap_err();
    assert!(matches!(e, TesseraError::Serde(_)));
    assert!(RendererOpts::from_json_str(r#"{ "cancel_policy": "sometimes" }"#).is_err());
}

#[test]
fn options_from_missing_file_is_io_error() {
    let e = RendererOpts::from_path("/nonexistent/tessera-opts.json").unwrap_err();
    assert!(matches!(e, TesseraError::Io(_)));
}

#[test]
fn zero_worker_threads_is_rejected() {
    let opts = RendererOpts {
        worker_threads: Some(0),
        ..RendererOpts::default()
    };
    assert!(Renderer::new(opts).is_err());
}

#[test]
fn single_block_renders_before_returning() {
    let (r, ex) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    let seen = collect(&r);
    let red = Arc::new(Shape::rect(Rect::new(0.0, 0.0, 10.0, 10.0), RED));

    let seq = r.render(&page(), vec![block(1, &red)]);

    let got = seen.lock();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].seq, seq);
    let raster = got[0].raster.as_ref().expect("raster");
    assert_eq!((raster.width(), raster.height()), (20, 20));
    assert_eq!(raster.pixel(3, 3).unwrap().to_array(), [255, 0, 0, 255]);
    assert_eq!(raster.pixel(15, 15).unwrap().a, 0);
    // The single tile does not go through the pool.
    assert_eq!(ex.jobs.load(Ordering::SeqCst), 0);
    assert!(r.outstanding_passes().is_empty());
}

#[test]
fn unchanged_blocks_are_reused() {
    let (r, ex) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    let a = Arc::new(Shape::rect(Rect::new(0.0, 0.0, 5.0, 5.0), RED));
    let b = Arc::new(Shape::rect(Rect::new(5.0, 5.0, 10.0, 10.0), GREEN));

    r.render(&page(), vec![block(1, &a), block(2, &b)]);
    r.wait_idle();
    assert_eq!(ex.jobs.load(Ordering::SeqCst), 2);

    a.set_redraw_needed(false);
    b.set_redraw_needed(false);
    r.render(&page(), vec![block(1, &a), block(2, &b)]);
    r.wait_idle();
    assert_eq!(ex.jobs.load(Ordering::SeqCst), 2);

    b.set_redraw_needed(true);
    r.render(&page(), vec![block(1, &a), block(2, &b)]);
    r.wait_idle();
    assert_eq!(ex.jobs.load(Ordering::SeqCst), 3);

    let stats = r.stats();
    assert_eq!(stats.tiles_submitted, 3);
    assert_eq!(stats.tiles_reused, 3);
    assert_eq!(stats.passes_submitted, 3);
    assert_eq!(stats.passes_completed, 3);
}

#[test]
fn cache_follows_the_latest_pass() {
    let (r, _) = inline_renderer(CancelPolicy::NoCancel);
    let a = Arc::new(Shape::rect(Rect::new(0.0, 0.0, 5.0, 5.0), RED));
    let b = Arc::new(Shape::rect(Rect::new(5.0, 5.0, 10.0, 10.0), GREEN));

    r.render(&page(), vec![block(1, &a), block(2, &b)]);
    r.wait_idle();
    assert_eq!(r.cached_blocks(), vec![BlockId(1), BlockId(2)]);

    r.render(&page(), vec![block(2, &b), block(3, &a)]);
    r.wait_idle();
    assert_eq!(r.cached_blocks(), vec![BlockId(2), BlockId(3)]);
}

struct Failing;

impl Drawable for Failing {
    fn transform(&self) -> crate::foundation::core::Affine {
        crate::foundation::core::Affine::IDENTITY
    }

    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, 4.0, 4.0)
    }

    fn is_redraw_needed(&self) -> bool {
        false
    }

    fn draw(&self, _ctx: &mut crate::render::draw::DrawContext<'_>) -> anyhow::Result<()> {
        anyhow::bail!("no ink")
    }
}

#[test]
fn failed_tiles_are_skipped_and_never_reused() {
    let (r, ex) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    let seen = collect(&r);
    let red = Arc::new(Shape::rect(Rect::new(10.0, 10.0, 20.0, 20.0), RED));
    red.set_redraw_needed(false);
    let blocks = || {
        vec![
            CacheableBlock::new(BlockId(1), vec![Arc::new(Failing) as Arc<dyn Drawable>]),
            block(2, &red),
        ]
    };

    r.render(&page(), blocks());
    r.wait_idle();
    r.render(&page(), blocks());
    r.wait_idle();

    // The failing block is redrawn, the red one comes from the cache.
    assert_eq!(ex.jobs.load(Ordering::SeqCst), 3);
    let got = seen.lock();
    assert_eq!(got.len(), 2);
    let raster = got[1].raster.as_ref().unwrap();
    assert_eq!(raster.pixel(15, 15).unwrap().to_array(), [255, 0, 0, 255]);
    assert_eq!(raster.pixel(1, 1).unwrap().a, 0);
}

#[test]
fn duplicate_block_ids_keep_the_first() {
    let (r, ex) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    let seen = collect(&r);
    let red = Arc::new(Shape::rect(Rect::new(0.0, 0.0, 5.0, 5.0), RED));
    let green = Arc::new(Shape::rect(Rect::new(0.0, 0.0, 5.0, 5.0), GREEN));
    let other = Arc::new(Shape::rect(Rect::new(10.0, 10.0, 15.0, 15.0), GREEN));

    r.render(
        &page(),
        vec![block(1, &red), block(2, &other), block(1, &green)],
    );
    r.wait_idle();

    assert_eq!(ex.jobs.load(Ordering::SeqCst), 2);
    assert_eq!(r.cached_blocks(), vec![BlockId(1), BlockId(2)]);
    let raster = seen.lock()[0].raster.clone().unwrap();
    assert_eq!(raster.pixel(2, 2).unwrap().to_array(), [255, 0, 0, 255]);
}

#[test]
fn empty_root_delivers_no_raster() {
    let (r, _) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    let seen = collect(&r);
    let empty = Page::new(Size::new(0.0, 10.0), 1.0);
    r.render(&empty, Vec::new());
    let got = seen.lock();
    assert_eq!(got.len(), 1);
    assert!(got[0].raster.is_none());
}

#[test]
fn failing_listeners_do_not_stop_the_others() {
    let (r, _) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    r.add_listener(|_: &RenderComplete| -> anyhow::Result<()> { anyhow::bail!("listener error") });
    r.add_listener(|_: &RenderComplete| -> anyhow::Result<()> { panic!("listener panic") });
    let seen = collect(&r);

    r.render(&page(), Vec::new());
    r.render(&page(), Vec::new());
    assert_eq!(seen.lock().len(), 2);
    assert_eq!(r.stats().passes_completed, 2);
}

#[test]
fn removed_listeners_are_not_notified() {
    let (r, _) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let id = r.add_listener(move |_: &RenderComplete| -> anyhow::Result<()> {
        h.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    r.render(&page(), Vec::new());
    assert!(r.remove_listener(id));
    assert!(!r.remove_listener(id));
    r.render(&page(), Vec::new());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn undelivered_output_is_recycled() {
    let pool = Arc::new(BufferPool::default());
    let r = Renderer::with_parts(
        CancelPolicy::CancelBeforeExecNewer,
        Arc::new(InlineExecutor),
        pool.clone(),
    );
    r.render(&page(), Vec::new());
    assert_eq!(pool.stats().recycled_buffers, 1);

    // A listener that keeps the raster keeps it out of the pool.
    let kept = Arc::new(Mutex::new(None));
    let k = kept.clone();
    r.add_listener(move |e: &RenderComplete| -> anyhow::Result<()> {
        *k.lock() = e.raster.clone();
        Ok(())
    });
    r.render(&page(), Vec::new());
    assert_eq!(pool.stats().recycled_buffers, 1);
    assert!(kept.lock().is_some());
}

#[test]
fn cancel_policy_can_change_at_runtime() {
    let (r, _) = inline_renderer(CancelPolicy::CancelBeforeExecNewer);
    assert_eq!(r.cancel_policy(), CancelPolicy::CancelBeforeExecNewer);
    r.set_cancel_policy(CancelPolicy::NoCancel);
    assert_eq!(r.cancel_policy(), CancelPolicy::NoCancel);
}
