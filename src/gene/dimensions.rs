//! Bottom-up scale and translation (spec §4.4, §9 "Scale inheritance").
//!
//! Every stroke whose bounds are well-formed (non-zero width and height)
//! computes its own `sx`/`sy`/`dx`/`dy` directly against its bound Han
//! stroke. A stroke whose bounds are degenerate (a single point, or entirely
//! unassigned) has no acid geometry to measure against, so it inherits its
//! group's values once those are known; a group with no well-formed stroke of
//! its own inherits the gene's. [`Inherited`] records which of the two axes
//! came from a promotion rather than a direct measurement.
//!
//! Group/gene scales are Han-dimension-weighted means of their members'
//! scales (spec §4.4 steps 2-3; `original_source/src/core/validate.cpp:238-
//! 254`'s `sxToHan += hst.getBounds().getWidth() * st.sxToHan()` accumulates
//! against the Han width, not a plain count). `dxParent`/`dyParent` mirror
//! `dx`/`dy` but align to the Han center using the *parent's* resolved scale
//! rather than the element's own (spec §4.4 step 5; `validate.cpp:158,161-
//! 162,357-362`); a gene's translation is the Han-arc-length-weighted mean of
//! its groups' `dxParent`/`dyParent`.

use crate::{geometry::Rectangle, han::HanRef, unit::Unit};

use super::{Gene, Inherited, InvalidFlags};

impl Gene {
    /// Recompute every stroke's, group's, and the gene's bounding rectangle
    /// from `points` (spec §4.3 "a stroke's bounds are the union of its
    /// acids' endpoints").
    pub fn ensure_bounds(&mut self) {
        for stroke in &mut self.strokes {
            let pts = self.points[stroke.acids.start..=stroke.acids.end].iter().copied();
            stroke.bounds = Rectangle::from_points(pts);
        }
        for group in &mut self.groups {
            group.bounds = group
                .strokes
                .iter()
                .filter_map(|&i| self.strokes[i].bounds)
                .reduce(Rectangle::union);
        }
        self.gene_bounds = self
            .strokes
            .iter()
            .filter_map(|s| s.bounds)
            .reduce(Rectangle::union);
    }

    /// Recompute every stroke's and group's scale/translation against `han`,
    /// promoting from group to gene where a stroke or group has no
    /// well-formed geometry of its own (spec §4.4).
    pub fn ensure_dimensions(&mut self, han: &HanRef) {
        if !self.invalid.contains(InvalidFlags::DIMENSIONS) {
            return;
        }
        self.ensure_bounds();

        // Step 1: each stroke's own scale/translation, measured directly
        // against its bound Han stroke (spec §4.4 step 1).
        for (stroke_idx, stroke) in self.strokes.iter_mut().enumerate() {
            let han_bounds = self.stroke_to_han.get(&stroke_idx).map(|&h| han.stroke(h).bounds);
            match (stroke.bounds, han_bounds) {
                (Some(b), Some(hb)) if is_well_formed(&b) => {
                    stroke.sx = Unit::new(b.width() / hb.width());
                    stroke.sy = Unit::new(b.height() / hb.height());
                    stroke.sxy = Unit::new(stroke.sx.value().hypot(stroke.sy.value()));
                    // Align own center to the Han center after applying own scale.
                    stroke.dx = Unit::new(hb.center().x.value() - b.center().x.value() * stroke.sx.value());
                    stroke.dy = Unit::new(hb.center().y.value() - b.center().y.value() * stroke.sy.value());
                    stroke.inherited = Inherited::default();
                }
                _ => {
                    stroke.sx = Unit::UNDEFINED;
                    stroke.sy = Unit::UNDEFINED;
                    stroke.sxy = Unit::UNDEFINED;
                    stroke.dx = Unit::UNDEFINED;
                    stroke.dy = Unit::UNDEFINED;
                    stroke.inherited = Inherited { sx: true, sy: true };
                }
            }
        }

        // Step 2: group scale is the Han-width-weighted (sx) / Han-height-
        // weighted (sy) mean of its directly-measured strokes' scales.
        for group in &mut self.groups {
            let (mut sx_weighted, mut sx_weight) = (0.0, 0.0);
            let (mut sy_weighted, mut sy_weight) = (0.0, 0.0);
            for &s in &group.strokes {
                let stroke = &self.strokes[s];
                if stroke.inherited.sx {
                    continue;
                }
                let Some(&han_id) = self.stroke_to_han.get(&s) else { continue };
                let hb = han.stroke(han_id).bounds;
                sx_weighted += hb.width() * stroke.sx.value();
                sx_weight += hb.width();
                sy_weighted += hb.height() * stroke.sy.value();
                sy_weight += hb.height();
            }
            if sx_weight > crate::unit::EPSILON && sy_weight > crate::unit::EPSILON {
                group.sx = Unit::new(sx_weighted / sx_weight);
                group.sy = Unit::new(sy_weighted / sy_weight);
                group.sxy = Unit::new(group.sx.value().hypot(group.sy.value()));
                group.inherited = Inherited::default();
            } else {
                group.sx = Unit::UNDEFINED;
                group.sy = Unit::UNDEFINED;
                group.sxy = Unit::UNDEFINED;
                group.inherited = Inherited { sx: true, sy: true };
            }
        }

        // Step 3: group translation, own scale, aligning the group's own
        // bounds center to its Han group's center (spec §4.4 step 5).
        for (group_idx, group) in self.groups.iter_mut().enumerate() {
            let (Some(b), Some(hg)) = (group.bounds, han.groups.get(group_idx)) else { continue };
            if let (Some(sx), Some(sy)) = (group.sx.get(), group.sy.get()) {
                group.dx = Unit::new(hg.bounds.center().x.value() - b.center().x.value() * sx);
                group.dy = Unit::new(hg.bounds.center().y.value() - b.center().y.value() * sy);
            }
        }

        // Step 4: gene scale is the Han-width-weighted (sx) / Han-height-
        // weighted (sy) mean of its directly-measured groups' scales. Groups
        // share an index with the Han's own `groups` list (the same
        // assumption stroke_to_han already makes one level down).
        let (mut sx_weighted, mut sx_weight) = (0.0, 0.0);
        let (mut sy_weighted, mut sy_weight) = (0.0, 0.0);
        for (group_idx, group) in self.groups.iter().enumerate() {
            if group.inherited.sx {
                continue;
            }
            let Some(hg) = han.groups.get(group_idx) else { continue };
            sx_weighted += hg.bounds.width() * group.sx.value();
            sx_weight += hg.bounds.width();
            sy_weighted += hg.bounds.height() * group.sy.value();
            sy_weight += hg.bounds.height();
        }
        if sx_weight > crate::unit::EPSILON && sy_weight > crate::unit::EPSILON {
            self.gene_sx = Unit::new(sx_weighted / sx_weight);
            self.gene_sy = Unit::new(sy_weighted / sy_weight);
        } else {
            self.gene_sx = Unit::UNDEFINED;
            self.gene_sy = Unit::UNDEFINED;
        }

        // A second pass promotes any group/stroke still undefined down from
        // whatever the gene or its own group ultimately resolved to.
        for group in &mut self.groups {
            if group.inherited.sx && self.gene_sx.is_defined() {
                group.sx = self.gene_sx;
                group.sy = self.gene_sy;
                group.sxy = Unit::new(group.sx.value().hypot(group.sy.value()));
            }
        }
        for (stroke_idx, stroke) in self.strokes.iter_mut().enumerate() {
            if !stroke.inherited.sx {
                continue;
            }
            if let Some(group_idx) = self.stroke_to_group.get(&stroke_idx) {
                let group = &self.groups[*group_idx];
                if group.sx.is_defined() {
                    stroke.sx = group.sx;
                    stroke.sy = group.sy;
                    stroke.sxy = group.sxy;
                }
            } else if self.gene_sx.is_defined() {
                stroke.sx = self.gene_sx;
                stroke.sy = self.gene_sy;
                stroke.sxy = Unit::new(stroke.sx.value().hypot(stroke.sy.value()));
            }
        }

        // Step 5: parent-scale translations (spec §3 `dxParent`/`dyParent`),
        // now that every scale (own or promoted) has settled.
        for i in 0..self.strokes.len() {
            let Some(group_idx) = self.stroke_to_group.get(&i).copied() else { continue };
            let (gsx, gsy) = match (self.groups[group_idx].sx.get(), self.groups[group_idx].sy.get()) {
                (Some(sx), Some(sy)) => (sx, sy),
                _ => continue,
            };
            let Some(&han_id) = self.stroke_to_han.get(&i) else { continue };
            let stroke = &mut self.strokes[i];
            let Some(b) = stroke.bounds else { continue };
            let hb = han.stroke(han_id).bounds;
            stroke.dx_parent = Unit::new(hb.center().x.value() - b.center().x.value() * gsx);
            stroke.dy_parent = Unit::new(hb.center().y.value() - b.center().y.value() * gsy);
        }
        for (group_idx, group) in self.groups.iter_mut().enumerate() {
            let (Some(gsx), Some(gsy)) = (self.gene_sx.get(), self.gene_sy.get()) else { continue };
            let (Some(b), Some(hg)) = (group.bounds, han.groups.get(group_idx)) else { continue };
            group.dx_parent = Unit::new(hg.bounds.center().x.value() - b.center().x.value() * gsx);
            group.dy_parent = Unit::new(hg.bounds.center().y.value() - b.center().y.value() * gsy);
        }

        // Step 6: gene translation is the Han-arc-length-weighted mean of
        // its groups' `dxParent`/`dyParent` (spec §4.4 step 5).
        let (mut dx_weighted, mut dy_weighted, mut weight) = (0.0, 0.0, 0.0);
        for (group_idx, group) in self.groups.iter().enumerate() {
            let (Some(dxp), Some(dyp)) = (group.dx_parent.get(), group.dy_parent.get()) else { continue };
            let Some(hg) = han.groups.get(group_idx) else { continue };
            let w: f64 = hg.strokes.iter().map(|&s| han.stroke(s).arc_length()).sum();
            dx_weighted += w * dxp;
            dy_weighted += w * dyp;
            weight += w;
        }
        if weight > crate::unit::EPSILON {
            self.gene_dx = Unit::new(dx_weighted / weight);
            self.gene_dy = Unit::new(dy_weighted / weight);
        } else {
            self.gene_dx = Unit::UNDEFINED;
            self.gene_dy = Unit::UNDEFINED;
        }

        self.invalid.clear(InvalidFlags::DIMENSIONS);
    }
}

fn is_well_formed(b: &Rectangle) -> bool {
    b.width() > crate::unit::EPSILON && b.height() > crate::unit::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        acid::CodonTable,
        geometry::{Point, Range},
        han::{HanGroup, HanRef, HanStroke},
    };

    fn bases_of(s: &str) -> Vec<crate::acid::Base> {
        s.chars().map(|c| crate::acid::Base::try_from(c).unwrap()).collect()
    }

    fn compiled_gene(dna: &str) -> Gene {
        let bases = bases_of(dna);
        let mut gene = Gene::new(Range::new(0, bases.len() - 1), Point::ORIGIN);
        let table = CodonTable::standard();
        gene.ensure_acids(&bases, &table).unwrap();
        gene.ensure_coherence();
        gene.ensure_segments();
        gene.ensure_strokes(0).unwrap();
        gene
    }

    fn sample_han(bounds: Rectangle) -> HanRef {
        HanRef {
            unicode: '人',
            length: 1.0,
            bounds,
            minimum_stroke_length: 0.1,
            groups: vec![HanGroup { id: 0, strokes: vec![0], bounds }],
            strokes: vec![HanStroke {
                id: 0,
                forward: vec![],
                reverse: vec![],
                bounds,
            }],
            overlaps: vec![],
        }
    }

    #[test]
    fn bound_stroke_computes_direct_scale() {
        let mut gene = compiled_gene("ATGGGTGGTGGTGGTTAA");
        assert_eq!(gene.strokes.len(), 1);
        gene.bind_stroke(0, 0);
        gene.groups.push(crate::gene::Group::new(vec![0]));
        gene.stroke_to_group.insert(0, 0);

        let han_bounds = Rectangle {
            top_left: Point::new(0.0, 2.0),
            bottom_right: Point::new(2.0, 0.0),
        };
        let han = sample_han(han_bounds);
        gene.ensure_dimensions(&han);
        assert!(gene.strokes[0].sx.is_defined());
        assert!(!gene.strokes[0].inherited.sx);
    }

    #[test]
    fn unassigned_stroke_inherits_from_gene() {
        let mut gene = compiled_gene("ATGGGTGGTGGTGGTTAA");
        gene.groups.push(crate::gene::Group::new(vec![0]));
        gene.stroke_to_group.insert(0, 0);
        gene.gene_sx = Unit::new(1.5);
        gene.gene_sy = Unit::new(1.5);
        gene.invalid.set(InvalidFlags::DIMENSIONS);

        let han = sample_han(Rectangle {
            top_left: Point::new(0.0, 2.0),
            bottom_right: Point::new(2.0, 0.0),
        });
        gene.ensure_dimensions(&han);
        assert!(gene.strokes[0].inherited.sx);
    }

    #[test]
    fn group_scale_is_han_dimension_weighted_not_a_plain_mean() {
        // Two strokes in one group: a wide/short one and a narrow/tall one,
        // bound to Han strokes of very different widths. A plain mean of
        // sx would split the difference evenly; the Han-width-weighted mean
        // must lean toward the wider Han stroke's contribution.
        let mut gene = Gene::new(Range::new(0, 26), Point::ORIGIN);
        gene.points = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 1.0),
            Point::new(0.0, 0.0),
            Point::new(1.0, 1.0),
        ];
        gene.strokes = vec![
            crate::gene::Stroke::new(Range::new(0, 1)),
            crate::gene::Stroke::new(Range::new(2, 3)),
        ];
        gene.groups = vec![crate::gene::Group::new(vec![0, 1])];
        gene.stroke_to_group.insert(0, 0);
        gene.stroke_to_group.insert(1, 0);
        gene.bind_stroke(0, 0);
        gene.bind_stroke(1, 1);
        gene.invalid.set(InvalidFlags::DIMENSIONS);

        let wide_han = Rectangle { top_left: Point::new(0.0, 1.0), bottom_right: Point::new(20.0, 0.0) };
        let narrow_han = Rectangle { top_left: Point::new(0.0, 1.0), bottom_right: Point::new(1.0, 0.0) };
        let han = HanRef {
            unicode: '人',
            length: 1.0,
            bounds: wide_han,
            minimum_stroke_length: 0.1,
            groups: vec![HanGroup { id: 0, strokes: vec![0, 1], bounds: wide_han }],
            strokes: vec![
                HanStroke { id: 0, forward: vec![], reverse: vec![], bounds: wide_han },
                HanStroke { id: 1, forward: vec![], reverse: vec![], bounds: narrow_han },
            ],
            overlaps: vec![],
        };
        gene.ensure_dimensions(&han);

        // stroke 0: sx = 10/20 = 0.5 (weight 20); stroke 1: sx = 1/1 = 1.0 (weight 1).
        // Weighted mean = (20*0.5 + 1*1.0) / 21 = 11/21, far from the plain mean 0.75.
        let expected = (20.0 * 0.5 + 1.0 * 1.0) / 21.0;
        assert!((gene.groups[0].sx.value() - expected).abs() < 1e-9);
        assert!((gene.groups[0].sx.value() - 0.75).abs() > 1e-3);
    }
}
