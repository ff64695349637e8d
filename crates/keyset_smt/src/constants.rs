/// Reserved integer sentinels every first-order sort (`Data`, `Pointer`,
/// `ThreadId`) shares, per spec §4.D "Data values are bounded by [MIN,MAX]
/// (two sentinel ints reserved for min/max, a third for null)". Keeping a
/// single reserved triple across sorts, rather than one per sort, is the
/// simplest encoding that satisfies "distinctness between any two live
/// memory addresses and the null sentinel".
pub const NULL_SENTINEL: i64 = i64::MIN;
pub const MIN_SENTINEL: i64 = i64::MIN + 1;
pub const MAX_SENTINEL: i64 = i64::MAX;

/// A fourth reserved sentinel, for the `ThreadId` sort's "unlocked" literal.
pub const UNLOCKED_SENTINEL: i64 = i64::MIN + 2;

