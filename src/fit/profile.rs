//! The subset of the FIT global profile this crate understands.
//!
//! Messages and fields missing from these tables still decode; they are named
//! `unknown_<number>` and keep their raw values.

pub type EnumTable = &'static [(u32, &'static str)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldKind {
    /// Numeric or string value, with optional scale/offset.
    Plain,
    /// Seconds since the FIT epoch, UTC.
    DateTime,
    /// Seconds since the FIT epoch, local wall clock.
    LocalDateTime,
    /// Angle in semicircles, converted to degrees.
    Semicircles,
    Enum(EnumTable),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub number: u8,
    pub name: &'static str,
    pub kind: FieldKind,
    pub scale: f64,
    pub offset: f64,
    pub units: Option<&'static str>,
}

#[derive(Debug)]
pub struct MessageDef {
    pub number: u16,
    pub name: &'static str,
    pub fields: &'static [FieldDef],
}

impl MessageDef {
    pub fn field(&self, number: u8) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.number == number)
    }
}

pub mod mesg_num {
    pub const FILE_ID: u16 = 0;
    pub const SPORT: u16 = 12;
    pub const SESSION: u16 = 18;
    pub const LAP: u16 = 19;
    pub const RECORD: u16 = 20;
    pub const EVENT: u16 = 21;
    pub const DEVICE_INFO: u16 = 23;
    pub const ACTIVITY: u16 = 34;
    pub const FILE_CREATOR: u16 = 49;
    pub const FIELD_DESCRIPTION: u16 = 206;
    pub const DEVELOPER_DATA_ID: u16 = 207;
}

/// Field number shared by every message carrying a timestamp.
pub const TIMESTAMP_FIELD: u8 = 253;

/// 2^31 semicircles make 180 degrees.
pub const SEMICIRCLES_TO_DEGREES: f64 = 180.0 / 2_147_483_648.0;

const fn plain(number: u8, name: &'static str) -> FieldDef {
    FieldDef {
        number,
        name,
        kind: FieldKind::Plain,
        scale: 1.0,
        offset: 0.0,
        units: None,
    }
}

const fn units(number: u8, name: &'static str, units: &'static str) -> FieldDef {
    FieldDef {
        number,
        name,
        kind: FieldKind::Plain,
        scale: 1.0,
        offset: 0.0,
        units: Some(units),
    }
}

const fn scaled(
    number: u8,
    name: &'static str,
    scale: f64,
    offset: f64,
    units: &'static str,
) -> FieldDef {
    FieldDef {
        number,
        name,
        kind: FieldKind::Plain,
        scale,
        offset,
        units: Some(units),
    }
}

const fn date_time(number: u8, name: &'static str) -> FieldDef {
    FieldDef {
        number,
        name,
        kind: FieldKind::DateTime,
        scale: 1.0,
        offset: 0.0,
        units: None,
    }
}

const fn local_date_time(number: u8, name: &'static str) -> FieldDef {
    FieldDef {
        number,
        name,
        kind: FieldKind::LocalDateTime,
        scale: 1.0,
        offset: 0.0,
        units: None,
    }
}

const fn semicircles(number: u8, name: &'static str) -> FieldDef {
    FieldDef {
        number,
        name,
        kind: FieldKind::Semicircles,
        scale: 1.0,
        offset: 0.0,
        units: Some("degrees"),
    }
}

const fn enumerated(number: u8, name: &'static str, table: EnumTable) -> FieldDef {
    FieldDef {
        number,
        name,
        kind: FieldKind::Enum(table),
        scale: 1.0,
        offset: 0.0,
        units: None,
    }
}

pub mod enums {
    use super::EnumTable;

    pub const FILE: EnumTable = &[
        (1, "device"),
        (2, "settings"),
        (3, "sport"),
        (4, "activity"),
        (5, "workout"),
        (6, "course"),
        (7, "schedules"),
        (9, "weight"),
        (10, "totals"),
        (11, "goals"),
        (14, "blood_pressure"),
        (15, "monitoring_a"),
        (20, "activity_summary"),
        (28, "monitoring_daily"),
        (32, "monitoring_b"),
        (34, "segment"),
        (35, "segment_list"),
    ];

    pub const MANUFACTURER: EnumTable = &[
        (1, "garmin"),
        (2, "garmin_fr405_antfs"),
        (3, "zephyr"),
        (13, "dynastream_oem"),
        (15, "dynastream"),
        (23, "suunto"),
        (32, "wahoo_fitness"),
        (89, "tacx"),
        (95, "stryd"),
        (255, "development"),
        (260, "zwift"),
        (265, "strava"),
        (289, "hammerhead"),
        (294, "coros"),
    ];

    pub const SPORT: EnumTable = &[
        (0, "generic"),
        (1, "running"),
        (2, "cycling"),
        (3, "transition"),
        (4, "fitness_equipment"),
        (5, "swimming"),
        (6, "basketball"),
        (7, "soccer"),
        (8, "tennis"),
        (9, "american_football"),
        (10, "training"),
        (11, "walking"),
        (12, "cross_country_skiing"),
        (13, "alpine_skiing"),
        (14, "snowboarding"),
        (15, "rowing"),
        (16, "mountaineering"),
        (17, "hiking"),
        (18, "multisport"),
        (19, "paddling"),
        (254, "all"),
    ];

    pub const SUB_SPORT: EnumTable = &[
        (0, "generic"),
        (1, "treadmill"),
        (2, "street"),
        (3, "trail"),
        (4, "track"),
        (5, "spin"),
        (6, "indoor_cycling"),
        (7, "road"),
        (8, "mountain"),
        (9, "downhill"),
        (10, "recumbent"),
        (11, "cyclocross"),
        (12, "hand_cycling"),
        (13, "track_cycling"),
        (14, "indoor_rowing"),
        (15, "elliptical"),
        (16, "stair_climbing"),
        (17, "lap_swimming"),
        (18, "open_water"),
        (254, "all"),
    ];

    pub const LAP_TRIGGER: EnumTable = &[
        (0, "manual"),
        (1, "time"),
        (2, "distance"),
        (3, "position_start"),
        (4, "position_lap"),
        (5, "position_waypoint"),
        (6, "position_marked"),
        (7, "session_end"),
        (8, "fitness_equipment"),
    ];

    pub const EVENT: EnumTable = &[
        (0, "timer"),
        (3, "workout"),
        (4, "workout_step"),
        (5, "power_down"),
        (6, "power_up"),
        (7, "off_course"),
        (8, "session"),
        (9, "lap"),
        (10, "course_point"),
        (11, "battery"),
        (26, "activity"),
    ];

    pub const EVENT_TYPE: EnumTable = &[
        (0, "start"),
        (1, "stop"),
        (2, "consecutive_depreciated"),
        (3, "marker"),
        (4, "stop_all"),
        (5, "begin_depreciated"),
        (6, "end_depreciated"),
        (7, "end_all_depreciated"),
        (8, "stop_disable"),
        (9, "stop_disable_all"),
    ];

    pub const DEVICE_INDEX: EnumTable = &[(0, "creator")];

    pub const ACTIVITY: EnumTable = &[(0, "manual"), (1, "auto_multi_sport")];

    pub const BATTERY_STATUS: EnumTable = &[
        (1, "new"),
        (2, "good"),
        (3, "ok"),
        (4, "low"),
        (5, "critical"),
        (6, "charging"),
        (7, "unknown"),
    ];

    /// Manufacturers whose `product` field is a Garmin product number.
    pub const GARMIN_PRODUCT_MANUFACTURERS: &[u64] = &[1, 13, 15];

    pub fn lookup(table: EnumTable, value: u64) -> Option<&'static str> {
        table
            .iter()
            .find(|(key, _)| *key as u64 == value)
            .map(|(_, name)| *name)
    }
}

const FILE_ID_FIELDS: &[FieldDef] = &[
    enumerated(0, "type", enums::FILE),
    enumerated(1, "manufacturer", enums::MANUFACTURER),
    plain(2, "product"),
    plain(3, "serial_number"),
    date_time(4, "time_created"),
    plain(5, "number"),
    plain(8, "product_name"),
];

const FILE_CREATOR_FIELDS: &[FieldDef] = &[
    plain(0, "software_version"),
    plain(1, "hardware_version"),
];

const SPORT_FIELDS: &[FieldDef] = &[
    enumerated(0, "sport", enums::SPORT),
    enumerated(1, "sub_sport", enums::SUB_SPORT),
    plain(3, "name"),
];

const SESSION_FIELDS: &[FieldDef] = &[
    date_time(253, "timestamp"),
    plain(254, "message_index"),
    enumerated(0, "event", enums::EVENT),
    enumerated(1, "event_type", enums::EVENT_TYPE),
    date_time(2, "start_time"),
    enumerated(5, "sport", enums::SPORT),
    enumerated(6, "sub_sport", enums::SUB_SPORT),
    scaled(7, "total_elapsed_time", 1000.0, 0.0, "s"),
    scaled(8, "total_timer_time", 1000.0, 0.0, "s"),
    scaled(9, "total_distance", 100.0, 0.0, "m"),
    units(11, "total_calories", "kcal"),
    scaled(14, "avg_speed", 1000.0, 0.0, "m/s"),
    scaled(15, "max_speed", 1000.0, 0.0, "m/s"),
    units(16, "avg_heart_rate", "bpm"),
    units(17, "max_heart_rate", "bpm"),
    units(18, "avg_cadence", "rpm"),
    units(19, "max_cadence", "rpm"),
    units(20, "avg_power", "watts"),
    units(21, "max_power", "watts"),
    units(22, "total_ascent", "m"),
    units(23, "total_descent", "m"),
    plain(25, "first_lap_index"),
    plain(26, "num_laps"),
    scaled(124, "enhanced_avg_speed", 1000.0, 0.0, "m/s"),
    scaled(125, "enhanced_max_speed", 1000.0, 0.0, "m/s"),
];

const LAP_FIELDS: &[FieldDef] = &[
    date_time(253, "timestamp"),
    plain(254, "message_index"),
    enumerated(0, "event", enums::EVENT),
    enumerated(1, "event_type", enums::EVENT_TYPE),
    date_time(2, "start_time"),
    semicircles(3, "start_position_lat"),
    semicircles(4, "start_position_long"),
    scaled(7, "total_elapsed_time", 1000.0, 0.0, "s"),
    scaled(8, "total_timer_time", 1000.0, 0.0, "s"),
    scaled(9, "total_distance", 100.0, 0.0, "m"),
    scaled(13, "avg_speed", 1000.0, 0.0, "m/s"),
    scaled(14, "max_speed", 1000.0, 0.0, "m/s"),
    units(15, "avg_heart_rate", "bpm"),
    units(16, "max_heart_rate", "bpm"),
    units(17, "avg_cadence", "rpm"),
    units(18, "max_cadence", "rpm"),
    units(19, "avg_power", "watts"),
    units(20, "max_power", "watts"),
    enumerated(24, "lap_trigger", enums::LAP_TRIGGER),
    enumerated(25, "sport", enums::SPORT),
    scaled(110, "enhanced_avg_speed", 1000.0, 0.0, "m/s"),
];

const RECORD_FIELDS: &[FieldDef] = &[
    date_time(253, "timestamp"),
    semicircles(0, "position_lat"),
    semicircles(1, "position_long"),
    scaled(2, "altitude", 5.0, 500.0, "m"),
    units(3, "heart_rate", "bpm"),
    units(4, "cadence", "rpm"),
    scaled(5, "distance", 100.0, 0.0, "m"),
    scaled(6, "speed", 1000.0, 0.0, "m/s"),
    units(7, "power", "watts"),
    scaled(9, "grade", 100.0, 0.0, "%"),
    units(13, "temperature", "C"),
    scaled(39, "vertical_oscillation", 10.0, 0.0, "mm"),
    scaled(40, "stance_time_percent", 100.0, 0.0, "percent"),
    scaled(41, "stance_time", 10.0, 0.0, "ms"),
    scaled(53, "fractional_cadence", 128.0, 0.0, "rpm"),
    scaled(54, "total_hemoglobin_conc", 100.0, 0.0, "g/dL"),
    scaled(57, "saturated_hemoglobin_percent", 10.0, 0.0, "%"),
    scaled(73, "enhanced_speed", 1000.0, 0.0, "m/s"),
    scaled(78, "enhanced_altitude", 5.0, 500.0, "m"),
    scaled(83, "vertical_ratio", 100.0, 0.0, "percent"),
    scaled(85, "step_length", 10.0, 0.0, "mm"),
    scaled(108, "enhanced_respiration_rate", 100.0, 0.0, "Breaths/min"),
    scaled(139, "core_temperature", 100.0, 0.0, "C"),
];

const EVENT_FIELDS: &[FieldDef] = &[
    date_time(253, "timestamp"),
    enumerated(0, "event", enums::EVENT),
    enumerated(1, "event_type", enums::EVENT_TYPE),
    plain(3, "data"),
    plain(4, "event_group"),
];

const DEVICE_INFO_FIELDS: &[FieldDef] = &[
    date_time(253, "timestamp"),
    enumerated(0, "device_index", enums::DEVICE_INDEX),
    plain(1, "device_type"),
    enumerated(2, "manufacturer", enums::MANUFACTURER),
    plain(3, "serial_number"),
    plain(4, "product"),
    scaled(5, "software_version", 100.0, 0.0, ""),
    plain(6, "hardware_version"),
    units(7, "cum_operating_time", "s"),
    scaled(10, "battery_voltage", 256.0, 0.0, "V"),
    enumerated(11, "battery_status", enums::BATTERY_STATUS),
    plain(19, "descriptor"),
    plain(25, "source_type"),
    plain(27, "product_name"),
];

const ACTIVITY_FIELDS: &[FieldDef] = &[
    date_time(253, "timestamp"),
    scaled(0, "total_timer_time", 1000.0, 0.0, "s"),
    plain(1, "num_sessions"),
    enumerated(2, "type", enums::ACTIVITY),
    enumerated(3, "event", enums::EVENT),
    enumerated(4, "event_type", enums::EVENT_TYPE),
    local_date_time(5, "local_timestamp"),
    plain(6, "event_group"),
];

const FIELD_DESCRIPTION_FIELDS: &[FieldDef] = &[
    plain(0, "developer_data_index"),
    plain(1, "field_definition_number"),
    plain(2, "fit_base_type_id"),
    plain(3, "field_name"),
    plain(4, "array"),
    plain(5, "components"),
    plain(6, "scale"),
    plain(7, "offset"),
    plain(8, "units"),
    plain(14, "native_mesg_num"),
    plain(15, "native_field_num"),
];

const DEVELOPER_DATA_ID_FIELDS: &[FieldDef] = &[
    plain(0, "developer_id"),
    plain(1, "application_id"),
    enumerated(2, "manufacturer_id", enums::MANUFACTURER),
    plain(3, "developer_data_index"),
    plain(4, "application_version"),
];

static MESSAGES: &[MessageDef] = &[
    MessageDef {
        number: mesg_num::FILE_ID,
        name: "file_id",
        fields: FILE_ID_FIELDS,
    },
    MessageDef {
        number: mesg_num::SPORT,
        name: "sport",
        fields: SPORT_FIELDS,
    },
    MessageDef {
        number: mesg_num::SESSION,
        name: "session",
        fields: SESSION_FIELDS,
    },
    MessageDef {
        number: mesg_num::LAP,
        name: "lap",
        fields: LAP_FIELDS,
    },
    MessageDef {
        number: mesg_num::RECORD,
        name: "record",
        fields: RECORD_FIELDS,
    },
    MessageDef {
        number: mesg_num::EVENT,
        name: "event",
        fields: EVENT_FIELDS,
    },
    MessageDef {
        number: mesg_num::DEVICE_INFO,
        name: "device_info",
        fields: DEVICE_INFO_FIELDS,
    },
    MessageDef {
        number: mesg_num::ACTIVITY,
        name: "activity",
        fields: ACTIVITY_FIELDS,
    },
    MessageDef {
        number: mesg_num::FILE_CREATOR,
        name: "file_creator",
        fields: FILE_CREATOR_FIELDS,
    },
    MessageDef {
        number: mesg_num::FIELD_DESCRIPTION,
        name: "field_description",
        fields: FIELD_DESCRIPTION_FIELDS,
    },
    MessageDef {
        number: mesg_num::DEVELOPER_DATA_ID,
        name: "developer_data_id",
        fields: DEVELOPER_DATA_ID_FIELDS,
    },
];

pub fn message(number: u16) -> Option<&'static MessageDef> {
    MESSAGES.iter().find(|m| m.number == number)
}
