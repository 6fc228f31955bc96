//! Demo points used by the `client` binary, the benchmark and the tests.

use crate::normalize::GeoPoint;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemoPoint {
    pub label: &'static str,
    pub point: GeoPoint,
}

pub const OUTSIDE: DemoPoint = DemoPoint {
    label: "null island",
    point: GeoPoint::new(0.0, 0.0),
};

pub const KANSAS: DemoPoint = DemoPoint {
    label: "kansas",
    point: GeoPoint::new(38.445804, -99.716238),
};

pub const NEW_MEXICO: DemoPoint = DemoPoint {
    label: "new mexico",
    point: GeoPoint::new(35.982334, -105.473879),
};

pub const COLORADO: DemoPoint = DemoPoint {
    label: "colorado",
    point: GeoPoint::new(39.222653, -105.343049),
};

pub const DEMO_POINTS: [DemoPoint; 4] = [OUTSIDE, KANSAS, NEW_MEXICO, COLORADO];
