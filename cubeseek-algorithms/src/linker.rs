//! 3-D connected-component labelling of detection masks.

use cubeseek_core::{CubeError, DataCube};

use crate::error::{Error, LinkerError, Result};
use crate::source_table::SourceTable;

/// Linker configuration.
#[derive(Clone, Debug)]
pub struct LinkerConfig {
    /// Merging radius along x.
    pub radius_x: usize,
    /// Merging radius along y.
    pub radius_y: usize,
    /// Merging radius along z.
    pub radius_z: usize,
    /// Minimum bounding-box extent along x.
    pub min_size_x: usize,
    /// Minimum bounding-box extent along y.
    pub min_size_y: usize,
    /// Minimum bounding-box extent along z.
    pub min_size_z: usize,
    /// Discard sources whose summed flux is negative.
    pub remove_negative: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            radius_x: 1,
            radius_y: 1,
            radius_z: 1,
            min_size_x: 5,
            min_size_y: 5,
            min_size_z: 5,
            remove_negative: true,
        }
    }
}

impl LinkerConfig {
    /// Set all three merging radii.
    pub fn with_radius(mut self, x: usize, y: usize, z: usize) -> Self {
        self.radius_x = x;
        self.radius_y = y;
        self.radius_z = z;
        self
    }

    /// Set all three minimum extents.
    pub fn with_min_size(mut self, x: usize, y: usize, z: usize) -> Self {
        self.min_size_x = x;
        self.min_size_y = y;
        self.min_size_z = z;
        self
    }

    /// Enable or disable negative-source removal.
    pub fn with_remove_negative(mut self, remove: bool) -> Self {
        self.remove_negative = remove;
        self
    }
}

/// Link candidate pixels of `mask` into labelled sources.
///
/// `mask` must be a 32-bit integer cube with background 0 and candidates 1;
/// it is rewritten in place so that surviving sources carry consecutive
/// labels starting at 1. `data` supplies the flux sums used by the
/// negative-source filter. Returns the parameter table with one row per
/// surviving source, ordered by final label.
pub fn run_linker(
    data: &DataCube,
    mask: &mut DataCube,
    config: &LinkerConfig,
) -> Result<SourceTable> {
    if !data.data().is_float() {
        return Err(CubeError::NotFloatingPoint("linker").into());
    }
    if data.axis_size() != mask.axis_size() {
        return Err(CubeError::ShapeMismatch(data.axis_size(), mask.axis_size()).into());
    }
    let [nx, ny, nz] = mask.axis_size();
    for (axis, &size) in [nx, ny, nz].iter().enumerate() {
        if size >= usize::from(u16::MAX) + 1 {
            return Err(LinkerError::AxisTooLarge { axis, size }.into());
        }
    }

    let cube_data = data.data();
    let mask_data = mask
        .data_mut()
        .as_i32_mut()
        .ok_or(CubeError::NotMask("linker"))?;

    let mut table = SourceTable::new();
    let mut label: usize = 2;

    // The expansion work stack, reused across sources; its high-water mark
    // is bounded by the largest source's pixel count.
    let mut stack: Vec<(usize, usize, usize)> = Vec::new();

    for z in (0..nz).rev() {
        for y in (0..ny).rev() {
            for x in (0..nx).rev() {
                let index = x + nx * (y + ny * z);
                if mask_data[index] != 1 {
                    continue;
                }
                if label > i32::MAX as usize {
                    return Err(LinkerError::LabelOverflow.into());
                }

                mask_data[index] = label as i32;
                table.push(x as u16, y as u16, z as u16, cube_data.value_at(index));

                stack.push((x, y, z));
                while let Some((cx, cy, cz)) = stack.pop() {
                    let x1 = cx.saturating_sub(config.radius_x);
                    let y1 = cy.saturating_sub(config.radius_y);
                    let z1 = cz.saturating_sub(config.radius_z);
                    let x2 = (cx + config.radius_x).min(nx - 1);
                    let y2 = (cy + config.radius_y).min(ny - 1);
                    let z2 = (cz + config.radius_z).min(nz - 1);

                    for zz in z1..=z2 {
                        for yy in y1..=y2 {
                            for xx in x1..=x2 {
                                let dx = xx as i64 - cx as i64;
                                let dy = yy as i64 - cy as i64;
                                // Neighbours inside the product-of-radii
                                // disc are skipped, not linked.
                                if dx * dx + dy * dy
                                    < config.radius_x as i64 * config.radius_y as i64
                                {
                                    continue;
                                }

                                let neighbour = xx + nx * (yy + ny * zz);
                                if mask_data[neighbour] == 1 {
                                    mask_data[neighbour] = label as i32;
                                    table.update(
                                        label,
                                        xx as u16,
                                        yy as u16,
                                        zz as u16,
                                        cube_data.value_at(neighbour),
                                    );
                                    stack.push((xx, yy, zz));
                                }
                            }
                        }
                    }
                }

                label += 1;
            }
        }
    }

    log::info!("linker found {} provisional source(s)", label - 2);

    // Filter and relabel in a second pass.
    let mut next_label: usize = 1;
    for z in (0..nz).rev() {
        for y in (0..ny).rev() {
            for x in (0..nx).rev() {
                let index = x + nx * (y + ny * z);
                let value = mask_data[index];
                if value <= 0 {
                    continue;
                }
                let row = value as usize;

                let too_small = table.get_size(row, 0) < config.min_size_x
                    || table.get_size(row, 1) < config.min_size_y
                    || table.get_size(row, 2) < config.min_size_z;
                let negative = config.remove_negative && table.f_sum(row) < 0.0;

                if too_small || negative {
                    mask_data[index] = 0;
                } else {
                    if table.get_label(row) == 0 {
                        table.set_label(row, next_label);
                        next_label += 1;
                    }
                    mask_data[index] = table.get_label(row) as i32;
                }
            }
        }
    }

    table.reduce();
    log::info!("{} source(s) remain after filtering", table.source_count());

    Ok(table)
}
