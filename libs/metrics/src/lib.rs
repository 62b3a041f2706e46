//! Process-global counters for the garbage collector and extent store,
//! registered against the default `prometheus` registry the way the
//! pageserver's `libs/metrics` crate wraps counters for the rest of the
//! workspace.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

pub static EXTENTS_CREATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "persistence_extents_created_total",
        "Number of extents created by the writer pool"
    )
    .expect("metric registration is infallible outside of name collisions")
});

pub static BYTES_APPENDED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "persistence_bytes_appended_total",
        "Total bytes appended across all extents"
    )
    .expect("metric registration is infallible outside of name collisions")
});

pub static GC_EXTENTS_SCANNED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "persistence_gc_extents_scanned_total",
        "Number of extent catalog rows examined by GC sweeps"
    )
    .expect("metric registration is infallible outside of name collisions")
});

pub static GC_EXTENTS_DELETED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "persistence_gc_extents_deleted_total",
        "Number of extents reclaimed by GC sweeps"
    )
    .expect("metric registration is infallible outside of name collisions")
});

pub static GC_BYTES_RECLAIMED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "persistence_gc_bytes_reclaimed_total",
        "Total bytes reclaimed by GC sweeps"
    )
    .expect("metric registration is infallible outside of name collisions")
});

pub static OPEN_WRITERS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "persistence_open_writers",
        "Number of currently open append files in the writer pool"
    )
    .expect("metric registration is infallible outside of name collisions")
});
