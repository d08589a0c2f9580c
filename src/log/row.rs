/// Log column names, in table order. These are the serialized field names of
/// `ObservationRecord`.
pub const LOG_COLUMNS: [&str; 24] = [
    "FILE",
    "INDEX",
    "BEAM",
    "TARGET_NAME",
    "TARGET_TYPE",
    "FIXED-MOVING",
    "RA",
    "DEC",
    "HA",
    "PA",
    "UT_DATE",
    "UT_TIME",
    "DATETIME",
    "MJD",
    "AIRMASS",
    "INTEGRATION",
    "COADDS",
    "INSTRUMENT",
    "SLIT",
    "MODE",
    "PROGRAM",
    "OBSERVER",
    "PREFIX",
    "FILE_NUMBER",
];
