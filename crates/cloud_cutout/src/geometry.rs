//! Box arithmetic and path templating.

use crate::{CutoutError, CutoutResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `[x, y, z]` voxel coordinates.
pub type Vec3 = [i64; 3];

/// Fill each `{}` in `template` with the next keyword.
pub fn format_path<S: AsRef<str>>(template: &str, keywords: &[S]) -> CutoutResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    let mut used = 0;
    while let Some(pos) = rest.find("{}") {
        let keyword = keywords.get(used).ok_or_else(|| CutoutError::MissingKeyword {
            template: template.to_string(),
            given: keywords.len(),
        })?;
        out.push_str(&rest[..pos]);
        out.push_str(keyword.as_ref());
        rest = &rest[pos + 2..];
        used += 1;
    }
    out.push_str(rest);
    Ok(out)
}

/// Half-open box `[begin, end)` in `[x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bbox {
    pub begin: Vec3,
    pub end: Vec3,
}

impl Bbox {
    pub fn new(begin: Vec3, end: Vec3) -> CutoutResult<Self> {
        if (0..3).any(|d| end[d] <= begin[d]) {
            return Err(CutoutError::EmptyBox { begin, end });
        }
        Ok(Self { begin, end })
    }

    pub fn size(&self) -> Vec3 {
        [0, 1, 2].map(|d| self.end[d] - self.begin[d])
    }

    /// Scale down by `ratio`, flooring the start and rounding the stop up so
    /// the result still covers the original region.
    pub fn downsample(&self, ratio: Vec3) -> Self {
        Self {
            begin: [0, 1, 2].map(|d| self.begin[d].div_euclid(ratio[d])),
            end: [0, 1, 2].map(|d| ceil_div(self.end[d], ratio[d])),
        }
    }

    /// Overlap with `other`, if any.
    pub fn intersect(&self, other: &Bbox) -> Option<Bbox> {
        let begin = [0, 1, 2].map(|d| self.begin[d].max(other.begin[d]));
        let end = [0, 1, 2].map(|d| self.end[d].min(other.end[d]));
        Bbox::new(begin, end).ok()
    }
}

impl fmt::Display for Bbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [bx, by, bz] = self.begin;
        let [ex, ey, ez] = self.end;
        write!(f, "[{bx}:{ex}, {by}:{ey}, {bz}:{ez}]")
    }
}

fn ceil_div(a: i64, b: i64) -> i64 {
    let q = a.div_euclid(b);
    if a.rem_euclid(b) == 0 {
        q
    } else {
        q + 1
    }
}

/// Region to cut, as a centre and size or as explicit (possibly partial) bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxRequest {
    pub center: Option<Vec3>,
    pub size: Option<Vec3>,
    pub begin: Option<Vec3>,
    pub end: Option<Vec3>,
}

impl BoxRequest {
    pub fn centered(center: Vec3, size: Vec3) -> Self {
        Self {
            center: Some(center),
            size: Some(size),
            ..Default::default()
        }
    }

    pub fn span(begin: Vec3, end: Vec3) -> Self {
        Self {
            begin: Some(begin),
            end: Some(end),
            ..Default::default()
        }
    }

    /// Resolve to a mip-0 box. Missing bounds fall back to the volume's
    /// `voxel_offset` and `voxel_offset + volume_size`, or `begin + size`.
    pub fn resolve(&self, voxel_offset: Vec3, volume_size: Vec3) -> CutoutResult<Bbox> {
        if let Some(center) = self.center {
            let size = self.size.ok_or(CutoutError::CentreWithoutSize)?;
            let begin = [0, 1, 2].map(|d| center[d] - size[d].div_euclid(2));
            let end = [0, 1, 2].map(|d| begin[d] + size[d]);
            return Bbox::new(begin, end);
        }
        let begin = self.begin.unwrap_or(voxel_offset);
        let end = match (self.end, self.size) {
            (Some(end), _) => end,
            (None, Some(size)) => [0, 1, 2].map(|d| begin[d] + size[d]),
            (None, None) => [0, 1, 2].map(|d| voxel_offset[d] + volume_size[d]),
        };
        Bbox::new(begin, end)
    }

    /// Coordinate string used when an output path template has no keywords.
    pub fn coord_string(&self, resolved: &Bbox) -> String {
        match (self.center, self.size) {
            (Some([cx, cy, cz]), Some([sx, sy, sz])) => format!("x{cx}_y{cy}_z{cz}_s{sx}-{sy}-{sz}"),
            _ => (0..3)
                .map(|d| format!("{}-{}", resolved.begin[d], resolved.end[d]))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_fills_placeholders_in_order() {
        let path = format_path("gs://bucket/{}/img/{}", &["basil", "mip1"]).unwrap();
        assert_eq!(path, "gs://bucket/basil/img/mip1");
        assert_eq!(format_path("file:///plain", &[] as &[&str]).unwrap(), "file:///plain");
        assert!(matches!(
            format_path("a/{}/{}", &["x"]),
            Err(CutoutError::MissingKeyword { given: 1, .. })
        ));
    }

    #[test]
    fn centre_and_size_resolve_around_centre() {
        let b = BoxRequest::centered([100, 100, 20], [64, 64, 5]).resolve([0; 3], [1; 3]).unwrap();
        assert_eq!(b.begin, [68, 68, 18]);
        assert_eq!(b.end, [132, 132, 23]);
    }

    #[test]
    fn centre_without_size_fails() {
        let req = BoxRequest {
            center: Some([1, 1, 1]),
            ..Default::default()
        };
        assert!(matches!(req.resolve([0; 3], [8; 3]), Err(CutoutError::CentreWithoutSize)));
    }

    #[test]
    fn bounds_default_to_volume() {
        let whole = BoxRequest::default().resolve([10, 20, 30], [100, 100, 10]).unwrap();
        assert_eq!(whole, Bbox::new([10, 20, 30], [110, 120, 40]).unwrap());
        let sized = BoxRequest {
            begin: Some([12, 22, 31]),
            size: Some([4, 4, 2]),
            ..Default::default()
        }
        .resolve([10, 20, 30], [100, 100, 10])
        .unwrap();
        assert_eq!(sized.end, [16, 26, 33]);
    }

    #[test]
    fn downsample_floors_begin_and_ceils_end() {
        let b = Bbox::new([5, 8, 3], [19, 16, 7]).unwrap();
        let m = b.downsample([4, 4, 1]);
        assert_eq!(m.begin, [1, 2, 3]);
        assert_eq!(m.end, [5, 4, 7]);
        assert_eq!(b.downsample([1, 1, 1]), b);
    }

    #[test]
    fn coord_strings() {
        let centred = BoxRequest::centered([1, 2, 3], [4, 5, 6]);
        let b = centred.resolve([0; 3], [1; 3]).unwrap();
        assert_eq!(centred.coord_string(&b), "x1_y2_z3_s4-5-6");
        let span = BoxRequest::span([0, 10, 20], [5, 15, 25]);
        let b = span.resolve([0; 3], [1; 3]).unwrap();
        assert_eq!(span.coord_string(&b), "0-5_10-15_20-25");
    }
}
