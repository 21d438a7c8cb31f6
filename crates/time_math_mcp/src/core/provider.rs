use std::str::FromStr;

use chrono::Utc;
use chrono_tz::Tz;

use crate::core::{
    error::{TimeMathError, TimeMathResult},
    models::{
        BatchItem, BatchItemError, DebugMeta, ItemPayload, Operation, ResponseBody, ResponseMeta,
        TimeMathRequest, TimeMathResponse,
    },
    normalize,
    ops,
    plan::{self, InteractionMode, MAX_OPERATIONS, OperationPlan},
    timepoint::{self, TimePoint},
};

/// Batch time-arithmetic engine.
///
/// Stateless across requests: every request captures its own "now" at entry
/// and builds all intermediate values fresh. The only long-lived piece is the
/// detected local timezone used when the caller supplies none.
#[derive(Clone)]
pub struct TimeMathServer {
    pub(crate) local_timezone: Tz,
}

impl TimeMathServer {
    pub fn new() -> Self {
        // Try to detect the system's local timezone
        let local_tz = match iana_time_zone::get_timezone() {
            Ok(tz_name) => match tz_name.parse::<chrono_tz::Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    tracing::warn!("Could not parse timezone '{}', defaulting to UTC", tz_name);
                    chrono_tz::UTC
                }
            },
            Err(_) => {
                tracing::warn!("Could not detect system timezone, defaulting to UTC");
                chrono_tz::UTC
            }
        };

        Self {
            local_timezone: local_tz,
        }
    }

    pub(crate) fn parse_timezone(&self, timezone_name: &str) -> TimeMathResult<Tz> {
        Tz::from_str(timezone_name).map_err(|_| TimeMathError::InvalidTimezone {
            timezone: timezone_name.to_string(),
        })
    }

    /// Single entry point: run one batch time-arithmetic request.
    ///
    /// `debug` is the caller-environment flag deciding whether the verbose
    /// metadata block is attached; it is read once per request by the server
    /// boundary and passed in explicitly.
    pub fn execute(&self, req: &TimeMathRequest, debug: bool) -> TimeMathResult<TimeMathResponse> {
        let now = Utc::now();
        let operation = Operation::from_str(&req.operation)?;
        let requested = req.interaction_mode.unwrap_or(InteractionMode::AutoDetect);

        let base_zone_explicit = req
            .timezone
            .as_deref()
            .map(|tz| self.parse_timezone(tz))
            .transpose()?;
        let compare_zone_explicit = req
            .compare_time_timezone
            .as_deref()
            .map(|tz| self.parse_timezone(tz))
            .transpose()?
            .or(base_zone_explicit);

        let base_zone = base_zone_explicit.unwrap_or(self.local_timezone);
        let compare_zone = compare_zone_explicit.unwrap_or(self.local_timezone);

        if req.compare_time.is_none() {
            let needs_compare = operation.requires_compare()
                || matches!(
                    requested,
                    InteractionMode::Pairwise
                        | InteractionMode::CrossProduct
                        | InteractionMode::Aggregate
                );
            if needs_compare {
                return Err(TimeMathError::MissingCompareTime {
                    operation: operation.as_str().to_string(),
                });
            }
        }

        let base_raw = normalize::normalize(req.base_time.as_ref(), now, base_zone);
        let compare_raw = req
            .compare_time
            .as_ref()
            .map(|field| normalize::normalize(Some(field), now, compare_zone));

        let meta = ResponseMeta {
            operation: operation.as_str().to_string(),
            base_time: req.base_time.clone(),
            compare_time: req.compare_time.clone(),
            applied_duration: matches!(operation, Operation::Add | Operation::Subtract)
                .then(|| req.duration_spec()),
            timezone: base_zone.name().to_string(),
            compare_time_timezone: req
                .compare_time_timezone
                .as_ref()
                .map(|_| compare_zone.name().to_string()),
        };
        let debug_meta = debug.then(|| DebugMeta {
            computed_at: normalize::render_now(now, base_zone),
            resolution_timezone: base_zone.name().to_string(),
        });

        let ctx = RequestContext {
            base_zone_explicit,
            compare_zone_explicit,
            local_zone: self.local_timezone,
        };

        let (mode, items) = match operation {
            Operation::Add | Operation::Subtract => {
                self.run_shift(operation, requested, req, &base_raw, compare_raw.as_deref(), &ctx)?
            }
            Operation::Diff | Operation::DurationBetween => {
                // compare presence was checked above
                let compare_raw = compare_raw.clone().unwrap_or_default();
                self.run_pairing(operation, requested, base_raw.clone(), compare_raw, &ctx)?
            }
            Operation::Stats => {
                self.run_stats(base_raw.clone(), compare_raw.clone(), base_zone, &ctx)?
            }
            Operation::Sort => self.run_sort(&base_raw, base_zone, &ctx)?,
        };

        Ok(assemble(mode, items, meta, debug_meta))
    }

    /// Resolve a raw sequence. Fail-fast modes abort on the first unparseable
    /// timestamp; lenient resolution carries invalid points forward so each
    /// unit of work can fail independently.
    fn resolve_sequence(
        &self,
        raws: &[String],
        explicit_zone: Option<Tz>,
        local_zone: Tz,
        lenient: bool,
    ) -> TimeMathResult<Vec<TimePoint>> {
        let mut points = Vec::with_capacity(raws.len());
        for raw in raws {
            let point = timepoint::resolve(raw, explicit_zone, local_zone);
            if !lenient && !point.is_valid() {
                return Err(TimeMathError::InvalidTimestamp {
                    timestamp: raw.clone(),
                });
            }
            points.push(point);
        }
        Ok(points)
    }

    /// Duration application over every element of both sequences.
    ///
    /// The ceiling check here is stricter than the planner's interaction
    /// count: each element of each sequence independently receives the
    /// duration, so the summed lengths are what bound the work.
    fn run_shift(
        &self,
        operation: Operation,
        requested: InteractionMode,
        req: &TimeMathRequest,
        base_raw: &[String],
        compare_raw: Option<&[String]>,
        ctx: &RequestContext,
    ) -> TimeMathResult<(InteractionMode, Vec<BatchItem>)> {
        let spec = req.duration_spec();
        if spec.is_empty() {
            return Err(TimeMathError::EmptyDuration);
        }

        let compare_len = compare_raw.map_or(0, <[String]>::len);
        let total = base_raw.len() + compare_len;
        if total > MAX_OPERATIONS {
            return Err(TimeMathError::OperationCountExceeded {
                requested: total,
                limit: MAX_OPERATIONS,
            });
        }

        let mode = match requested {
            InteractionMode::AutoDetect => plan::detect_mode(base_raw.len(), compare_len),
            explicit => explicit,
        };

        let negate = operation == Operation::Subtract;
        let lenient = total > 1;
        let base_points =
            self.resolve_sequence(base_raw, ctx.base_zone_explicit, ctx.local_zone, lenient)?;
        let compare_points = match compare_raw {
            Some(raws) => {
                self.resolve_sequence(raws, ctx.compare_zone_explicit, ctx.local_zone, lenient)?
            }
            None => Vec::new(),
        };

        let mut items = Vec::with_capacity(total);
        for (point, from_base) in base_points
            .iter()
            .map(|p| (p, true))
            .chain(compare_points.iter().map(|p| (p, false)))
        {
            let index = items.len();
            match ops::apply_duration(point, &spec, negate) {
                Ok(result) => items.push(BatchItem::Success(ItemPayload::Shift(result))),
                Err(error) => items.push(BatchItem::Failure(BatchItemError {
                    index,
                    error,
                    base_time: from_base.then(|| point.raw().to_string()),
                    compare_time: (!from_base).then(|| point.raw().to_string()),
                })),
            }
        }

        // A single unit of work has no degraded path; surface its failure as
        // the request error. Resolution already failed fast above, so this
        // only covers arithmetic overflow.
        if items.len() == 1 {
            if let Some(BatchItem::Failure(failure)) = items.first() {
                return Err(TimeMathError::InvalidArguments {
                    message: failure.error.clone(),
                });
            }
        }

        Ok((mode, items))
    }

    /// Pairing operations (diff, duration_between) dispatched by interaction
    /// mode, base-major for cross products.
    fn run_pairing(
        &self,
        operation: Operation,
        requested: InteractionMode,
        base_raw: Vec<String>,
        compare_raw: Vec<String>,
        ctx: &RequestContext,
    ) -> TimeMathResult<(InteractionMode, Vec<BatchItem>)> {
        let plan = plan::build_plan(requested, base_raw, Some(compare_raw))?;

        // Aggregate pairs index-wise like pairwise, but collapses into one
        // duration-statistics summary instead of per-pair results.
        if plan.mode == InteractionMode::Aggregate {
            let (base_points, compare_points) = self.resolve_plan(&plan, ctx, true)?;
            let stats = ops::duration_pair_stats(&base_points, &compare_points)?;
            return Ok((
                InteractionMode::Aggregate,
                vec![BatchItem::Success(ItemPayload::DurationPairStats(stats))],
            ));
        }

        let lenient = plan.mode == InteractionMode::Pairwise;
        let (base_points, compare_points) = self.resolve_plan(&plan, ctx, lenient)?;

        let execute = |b: &TimePoint, c: &TimePoint| -> Result<ItemPayload, String> {
            match operation {
                Operation::Diff => ops::diff(b, c).map(ItemPayload::Diff),
                _ => ops::duration_between(b, c).map(ItemPayload::Breakdown),
            }
        };

        let mut items = Vec::with_capacity(plan.op_count);
        match plan.mode {
            InteractionMode::SingleToSingle => {
                let payload = execute(&base_points[0], &compare_points[0])
                    .map_err(|message| TimeMathError::InvalidArguments { message })?;
                items.push(BatchItem::Success(payload));
            }
            InteractionMode::SingleToMany => {
                for compare in &compare_points {
                    push_item(&mut items, execute(&base_points[0], compare), &base_points[0], compare);
                }
            }
            InteractionMode::ManyToSingle => {
                for base in &base_points {
                    push_item(&mut items, execute(base, &compare_points[0]), base, &compare_points[0]);
                }
            }
            InteractionMode::Pairwise => {
                for (base, compare) in base_points.iter().zip(compare_points.iter()) {
                    push_item(&mut items, execute(base, compare), base, compare);
                }
            }
            InteractionMode::CrossProduct => {
                for base in &base_points {
                    for compare in &compare_points {
                        push_item(&mut items, execute(base, compare), base, compare);
                    }
                }
            }
            InteractionMode::Aggregate | InteractionMode::AutoDetect => {
                unreachable!("handled before pairing dispatch")
            }
        }

        Ok((plan.mode, items))
    }

    /// Stats dispatch: timestamp-only over base when compare is absent,
    /// paired-duration statistics otherwise.
    fn run_stats(
        &self,
        base_raw: Vec<String>,
        compare_raw: Option<Vec<String>>,
        base_zone: Tz,
        ctx: &RequestContext,
    ) -> TimeMathResult<(InteractionMode, Vec<BatchItem>)> {
        match compare_raw {
            None => {
                if base_raw.len() > MAX_OPERATIONS {
                    return Err(TimeMathError::OperationCountExceeded {
                        requested: base_raw.len(),
                        limit: MAX_OPERATIONS,
                    });
                }
                let points = self.resolve_sequence(
                    &base_raw,
                    ctx.base_zone_explicit,
                    ctx.local_zone,
                    false,
                )?;
                let stats = ops::timestamp_stats(&points, base_zone)?;
                Ok((
                    InteractionMode::Aggregate,
                    vec![BatchItem::Success(ItemPayload::TimestampStats(stats))],
                ))
            }
            Some(compare_raw) => {
                let plan = plan::build_plan(InteractionMode::Aggregate, base_raw, Some(compare_raw))?;
                let (base_points, compare_points) = self.resolve_plan(&plan, ctx, true)?;
                let stats = ops::duration_pair_stats(&base_points, &compare_points)?;
                Ok((
                    InteractionMode::Aggregate,
                    vec![BatchItem::Success(ItemPayload::DurationPairStats(stats))],
                ))
            }
        }
    }

    fn run_sort(
        &self,
        base_raw: &[String],
        base_zone: Tz,
        ctx: &RequestContext,
    ) -> TimeMathResult<(InteractionMode, Vec<BatchItem>)> {
        if base_raw.len() > MAX_OPERATIONS {
            return Err(TimeMathError::OperationCountExceeded {
                requested: base_raw.len(),
                limit: MAX_OPERATIONS,
            });
        }
        let points =
            self.resolve_sequence(base_raw, ctx.base_zone_explicit, ctx.local_zone, false)?;
        let result = ops::sort_timestamps(&points, base_zone)?;
        Ok((
            InteractionMode::Aggregate,
            vec![BatchItem::Success(ItemPayload::Sort(result))],
        ))
    }

    fn resolve_plan(
        &self,
        plan: &OperationPlan,
        ctx: &RequestContext,
        lenient: bool,
    ) -> TimeMathResult<(Vec<TimePoint>, Vec<TimePoint>)> {
        let base_points =
            self.resolve_sequence(&plan.base, ctx.base_zone_explicit, ctx.local_zone, lenient)?;
        let compare_points = match plan.compare.as_deref() {
            Some(raws) => {
                self.resolve_sequence(raws, ctx.compare_zone_explicit, ctx.local_zone, lenient)?
            }
            None => Vec::new(),
        };
        Ok((base_points, compare_points))
    }
}

impl Default for TimeMathServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-request zone resolution handed down to the runner.
struct RequestContext {
    base_zone_explicit: Option<Tz>,
    compare_zone_explicit: Option<Tz>,
    local_zone: Tz,
}

fn push_item(
    items: &mut Vec<BatchItem>,
    result: Result<ItemPayload, String>,
    base: &TimePoint,
    compare: &TimePoint,
) {
    let index = items.len();
    match result {
        Ok(payload) => items.push(BatchItem::Success(payload)),
        Err(error) => items.push(BatchItem::Failure(BatchItemError {
            index,
            error,
            base_time: Some(base.raw().to_string()),
            compare_time: Some(compare.raw().to_string()),
        })),
    }
}

/// Shape the final structure: a bare payload for single results, a
/// count/results envelope otherwise.
fn assemble(
    mode: InteractionMode,
    items: Vec<BatchItem>,
    meta: ResponseMeta,
    debug: Option<DebugMeta>,
) -> TimeMathResponse {
    let body = if items.len() == 1 {
        match items.into_iter().next() {
            Some(BatchItem::Success(payload)) => ResponseBody::Single(payload),
            Some(failure) => ResponseBody::Batch {
                count: 1,
                interaction_mode: mode,
                results: vec![failure],
            },
            None => ResponseBody::Batch {
                count: 0,
                interaction_mode: mode,
                results: Vec::new(),
            },
        }
    } else {
        ResponseBody::Batch {
            count: items.len(),
            interaction_mode: mode,
            results: items,
        }
    };

    TimeMathResponse { body, meta, debug }
}
