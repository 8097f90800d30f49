use crate::types::{Dataset, GeoError, GeoReal, GeoResult, Trace, TraceRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Supergather geometry and offset binning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupergatherParams {
    /// CDP spacing between group centres
    pub step: i64,
    /// Half-width of each group's CDP window
    pub width: i64,
    /// Offset bin boundaries, strictly increasing
    pub bins: Vec<GeoReal>,
}

impl SupergatherParams {
    fn validate(&self) -> GeoResult<()> {
        if self.step <= 0 || self.width <= 0 {
            return Err(GeoError::Configuration(format!(
                "Supergather step ({}) and width ({}) must be positive",
                self.step, self.width
            )));
        }
        if self.bins.is_empty() {
            return Err(GeoError::Configuration(
                "At least one offset bin boundary is required".to_string(),
            ));
        }
        if self.bins.iter().any(|b| !b.is_finite()) || self.bins.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GeoError::Configuration(format!(
                "Offset bins must be finite and strictly increasing: {:?}",
                self.bins
            )));
        }
        Ok(())
    }
}

/// Groups traces from neighbouring CDPs, bins them by absolute offset and
/// stacks each bin into one fold-normalized trace.
pub struct SupergatherAggregator {
    params: SupergatherParams,
}

impl SupergatherAggregator {
    pub fn new(params: SupergatherParams) -> GeoResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SupergatherParams {
        &self.params
    }

    /// Group centres: every `step` CDPs from `min + width` up to, but not
    /// including, `max - width`.
    pub fn group_centres(&self, dataset: &Dataset) -> Vec<i64> {
        let cdps = dataset.iter().map(|r| r.header.cdp);
        let (min, max) = match (cdps.clone().min(), cdps.max()) {
            (Some(min), Some(max)) => (min, max),
            _ => return Vec::new(),
        };

        // A window edge past the i64 range leaves no room for a centre
        let (start, stop) = match (
            min.checked_add(self.params.width),
            max.checked_sub(self.params.width),
        ) {
            (Some(start), Some(stop)) => (start, stop),
            _ => return Vec::new(),
        };

        let step = self.params.step;
        std::iter::successors(Some(start), |centre| centre.checked_add(step))
            .take_while(|&centre| centre < stop)
            .collect()
    }

    /// Group id of every trace, `None` for traces outside all windows.
    ///
    /// Group `g` covers CDPs in `[centre - width, centre + width)`. Windows
    /// overlap when `step < 2 * width`; a trace then belongs to the highest
    /// numbered group containing it.
    pub fn assign_groups(&self, dataset: &Dataset) -> Vec<Option<usize>> {
        let centres = self.group_centres(dataset);
        let (start, last) = match (centres.first(), centres.len().checked_sub(1)) {
            (Some(&start), Some(last)) => (start, last),
            _ => return vec![None; dataset.len()],
        };
        let (step, width) = (i128::from(self.params.step), i128::from(self.params.width));
        let start = i128::from(start);

        dataset
            .iter()
            .map(|record| {
                let cdp = i128::from(record.header.cdp);
                let reach = cdp + width - start;
                if reach < 0 {
                    return None;
                }
                let group = usize::try_from(reach / step).map_or(last, |g| g.min(last));
                (i128::from(centres[group]) + width > cdp).then_some(group)
            })
            .collect()
    }

    /// Right-open histogram bin: the number of boundaries `<= offset`.
    /// A NaN offset lands in the last bin, past every boundary.
    pub fn offset_bin(&self, offset: GeoReal) -> usize {
        if offset.is_nan() {
            return self.params.bins.len();
        }
        self.params.bins.partition_point(|&b| b <= offset)
    }

    /// Build the stacked supergather dataset.
    ///
    /// Output traces are ordered by group id, then bin id. Each carries the
    /// header of the first trace in its cell with `|offset|`, `ns1` = group
    /// id, `ep` = bin id and `nhs` = fold.
    pub fn build(&self, dataset: &Dataset) -> GeoResult<Dataset> {
        log::info!(
            "Building supergathers from {} traces (step {}, width {}, {} bin boundaries)",
            dataset.len(),
            self.params.step,
            self.params.width,
            self.params.bins.len()
        );

        let assignments = self.assign_groups(dataset);

        let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, group) in assignments.iter().enumerate() {
            if let Some(group) = group {
                groups.entry(*group).or_default().push(index);
            }
        }

        let dropped = assignments.iter().filter(|g| g.is_none()).count();
        if groups.is_empty() {
            log::warn!("No trace fell inside a supergather window");
        } else {
            log::debug!(
                "{} supergathers, {} traces outside every window",
                groups.len(),
                dropped
            );
        }

        let groups: Vec<(usize, Vec<usize>)> = groups.into_iter().collect();

        #[cfg(feature = "parallel")]
        let stacked: Vec<Vec<TraceRecord>> = {
            use rayon::prelude::*;
            groups
                .par_iter()
                .map(|(group, members)| self.stack_group(dataset, *group, members))
                .collect::<GeoResult<_>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let stacked: Vec<Vec<TraceRecord>> = groups
            .iter()
            .map(|(group, members)| self.stack_group(dataset, *group, members))
            .collect::<GeoResult<_>>()?;

        let output = Dataset::new(stacked.into_iter().flatten().collect())?;
        log::info!("Supergather stack produced {} traces", output.len());
        Ok(output)
    }

    /// Stack one group's members bin by bin, in ascending bin order
    fn stack_group(
        &self,
        dataset: &Dataset,
        group: usize,
        members: &[usize],
    ) -> GeoResult<Vec<TraceRecord>> {
        let records = dataset.records();

        let mut bins: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &index in members {
            let offset = records[index].header.offset.abs();
            bins.entry(self.offset_bin(offset)).or_default().push(index);
        }

        bins.into_iter()
            .map(|(bin, cell)| {
                let first = &records[cell[0]];
                let fold = cell.len();

                let mut stacked = Trace::zeros(first.ns());
                for &index in &cell {
                    stacked += &records[index].trace;
                }
                stacked /= fold as GeoReal;

                let mut header = first.header.clone();
                header.offset = header.offset.abs();
                header.ns1 = id_field(group)?;
                header.ep = id_field(bin)?;
                header.nhs = u32::try_from(fold)
                    .map_err(|_| GeoError::Processing(format!("Fold {} overflows header", fold)))?;

                Ok(TraceRecord::new(header, stacked))
            })
            .collect()
    }
}

/// Stack `dataset` into offset-binned supergathers
pub fn build_supergather(
    step: i64,
    width: i64,
    bins: &[GeoReal],
    dataset: &Dataset,
) -> GeoResult<Dataset> {
    SupergatherAggregator::new(SupergatherParams {
        step,
        width,
        bins: bins.to_vec(),
    })?
    .build(dataset)
}

fn id_field(id: usize) -> GeoResult<i32> {
    i32::try_from(id).map_err(|_| GeoError::Processing(format!("Id {} overflows header", id)))
}
