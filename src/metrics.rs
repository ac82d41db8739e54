use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

lazy_static::lazy_static! {
    pub static ref REGION_GROWS_TOTAL: IntCounter = register_int_counter!(
        "ann_dkvs_region_grows_total", "Region remaps caused by growth"
    ).unwrap();
    pub static ref REGION_BYTES: IntGauge = register_int_gauge!(
        "ann_dkvs_region_bytes", "Size of the most recently grown region"
    ).unwrap();
    pub static ref LIST_REALLOCATIONS_TOTAL: IntCounter = register_int_counter!(
        "ann_dkvs_list_reallocations_total", "List resizes that moved data"
    ).unwrap();
    pub static ref BULK_ENTRIES_TOTAL: IntCounter = register_int_counter!(
        "ann_dkvs_bulk_entries_total", "Entries placed by bulk loading"
    ).unwrap();
    pub static ref QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "ann_dkvs_queries_total", "Queries processed", &["stage"]
    ).unwrap();
    pub static ref SEARCH_DURATION: HistogramVec = register_histogram_vec!(
        "ann_dkvs_search_duration_seconds", "Search duration", &["stage"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    ).unwrap();
}

pub fn init() {
    lazy_static::initialize(&REGION_GROWS_TOTAL);
    lazy_static::initialize(&REGION_BYTES);
    lazy_static::initialize(&LIST_REALLOCATIONS_TOTAL);
    lazy_static::initialize(&BULK_ENTRIES_TOTAL);
    lazy_static::initialize(&QUERIES_TOTAL);
    lazy_static::initialize(&SEARCH_DURATION);
}
