//! GeoJSON export of terrain/epipolar region pairs, for visual inspection.

use serde_json::{json, Value};
use stereo_tiling_core::BBox;

/// Closed counter-clockwise ring, starting at the bottom-right corner.
fn ring(b: &BBox) -> Value {
    json!([
        [b.xmax, b.ymin],
        [b.xmax, b.ymax],
        [b.xmin, b.ymax],
        [b.xmin, b.ymin],
        [b.xmax, b.ymin],
    ])
}

fn polygon(b: &BBox) -> Value {
    json!({ "type": "Polygon", "coordinates": [ring(b)] })
}

fn multipolygon(boxes: &[BBox]) -> Value {
    let polygons: Vec<Value> = boxes.iter().map(|b| json!([ring(b)])).collect();
    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

fn feature(id: usize, nb_epi: usize, geometry: Value) -> Value {
    json!({
        "type": "Feature",
        "properties": { "id": id, "nb_epi": nb_epi },
        "geometry": geometry,
    })
}

/// Two `FeatureCollection`s: terrain regions as polygons (terrain CRS) and,
/// for each, its epipolar regions as one multipolygon (epipolar pixels).
///
/// Features are paired by position; extra entries on either side are
/// ignored.
pub fn paired_regions_geojson(terrain_regions: &[BBox], epipolar_regions: &[Vec<BBox>]) -> (Value, Value) {
    let mut terrain = Vec::with_capacity(terrain_regions.len());
    let mut epipolar = Vec::with_capacity(terrain_regions.len());
    for (id, (ter, epi)) in terrain_regions.iter().zip(epipolar_regions).enumerate() {
        terrain.push(feature(id, epi.len(), polygon(ter)));
        epipolar.push(feature(id, epi.len(), multipolygon(epi)));
    }
    (
        json!({ "type": "FeatureCollection", "features": terrain }),
        json!({ "type": "FeatureCollection", "features": epipolar }),
    )
}
