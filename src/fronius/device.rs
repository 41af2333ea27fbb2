use num_enum::{IntoPrimitive, TryFromPrimitive};

// {{{ SystemType
/// What answered the broadcast GetVersion. Decides how error reporting is
/// switched on.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SystemType {
    #[default]
    Unset = 0,
    Datalogger = 1,
    IfcEasy = 2,
    Rs422 = 3,
}

impl std::fmt::Display for SystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unset => "unset",
            Self::Datalogger => "Datalogger",
            Self::IfcEasy => "IFC Easy",
            Self::Rs422 => "RS422",
        };
        write!(f, "{}", s)
    }
}
// }}}

/// Model name for the GetDeviceType reply byte.
pub fn device_type(code: u8) -> &'static str {
    match code {
        0xfe => "Fronius IG 15 (1300W)",
        0xfd => "Fronius IG 20 (1800W)",
        0xfc => "Fronius IG 30 (2500W)",
        0xfb => "Fronius IG 30 DUMMY",
        0xfa => "Fronius IG 40 (3500W)",
        0xf9 => "Fronius IG 60 (4600W)",
        0xf6 => "Fronius IG 300 (24000W)",
        0xf5 => "Fronius IG 400 (32000W)",
        0xf4 => "Fronius IG 500 (40000W)",
        0xf3 => "Fronius IG 60HV (4600W)",
        0xee => "Fronius IG 2000",
        0xed => "Fronius IG 3000",
        0xeb => "Fronius IG 4000",
        0xea => "Fronius IG 5100",
        0xe5 => "Fronius IG 2500LV",
        0xe3 => "Fronius IG 4500LV",
        0xdf => "Fronius IG Plus 11.4-3 Delta",
        0xde => "Fronius IG Plus 11.4-1 UNI",
        0xdd => "Fronius IG Plus 10.0-1 UNI",
        0xdc => "Fronius IG Plus 7.5-1 UNI",
        0xdb => "Fronius IG Plus 6.0-1 UNI",
        0xda => "Fronius IG Plus 5.0-1 UNI",
        0xd9 => "Fronius IG Plus 3.8-1 UNI",
        0xd8 => "Fronius IG Plus 3.0-1 UNI",
        0xd7 => "Fronius IG Plus 120-3 (10000W)",
        0xd6 => "Fronius IG Plus 70-2 (6500W)",
        0xd5 => "Fronius IG Plus 70-1 (6500)",
        0xd4 => "Fronius IG Plus 35-1 (3500W)",
        0xd3 => "Fronius IG Plus 150-3 (12000W)",
        0xd2 => "Fronius IG Plus 100-2 (8000W)",
        0xd1 => "Fronius IG Plus 100-1 (8000W)",
        0xd0 => "Fronius IG Plus 50-1 (4000W)",
        0xcf => "Fronius IG Plus 12.0-3 WYE277",
        0xc1 => "Fronius IG TL 3.6",
        0xc0 => "Fronius IG TL 5.0",
        0xbf => "Fronius IG TL 4.0",
        0xbe => "Fronius IG TL 3.0",
        0xb1 => "Fronius IG PLus 35V-1",
        0xb0 => "Fronius IG PLus 50V-1",
        0xaf => "Fronius IG PLus 70V-1",
        0xae => "Fronius IG PLus 70V-2",
        0xad => "Fronius IG PLus 100V-1",
        0xac => "Fronius IG PLus 100V-2",
        0xab => "Fronius IG PLus 120V-3",
        0xaa => "Fronius IG PLus 150V-3",
        0xa9 => "Fronius IG PLus V 3.0-1 UNI",
        0xa8 => "Fronius IG PLus V 3.8-1 UNI",
        0xa7 => "Fronius IG PLus V 5.0-1 UNI",
        0xa6 => "Fronius IG PLus V 6.0-1 UNI",
        0xa5 => "Fronius IG PLus V 7.5-1 UNI",
        0xa4 => "Fronius IG PLus V 10.0-1 UNI",
        0xa3 => "Fronius IG PLus V 11.4-1 UNI",
        0xa2 => "Fronius IG PLus V 11.4-3 DELTA",
        0xa1 => "Fronius IG PLus V 12.0-3 WYE",
        0xa0 => "Fronius IG PLus 50V-1 Dummy",
        0x9f => "Fronius IG PLus 100V-2 Dummy",
        0x9e => "Fronius IG PLus 150V-3 Dummy",
        0x9d => "Fronius IG PLus V 3.8-1 Dummy",
        0x9c => "Fronius IG PLus V 7.5-1 Dummy",
        0x9b => "Fronius IG PLus V 12.0-3 Dummy",
        0xbc => "Fronius CL 36.0",
        0xbd => "Fronius CL 48.0",
        0xc9 => "Fronius CL 60.0",
        0xb9 => "Fronius CL 36.0 WYE277",
        0xba => "Fronius CL 48.0 WYE277",
        0xbb => "Fronius CL 60.0 WYE277",
        0xb6 => "Fronius CL 33.3 Delta",
        0xb7 => "Fronius CL 44.4 Delta",
        0xb8 => "Fronius CL 55.5 Delta",
        0x9a => "Fronius CL 60.0 Dummy",
        0x99 => "Fronius CL 55.5 Delta Dummy",
        0x98 => "Fronius CL 60.0 WYE277 Dummy",
        0xff => "Fronius UNKNOWN",
        _ => "Unknown Device Type",
    }
}

/// Reason carried in the second byte of a ProtocolError reply.
pub fn protocol_error(code: u8) -> &'static str {
    match code {
        1 => "Unknown Command(1)",
        2 => "Timeout(2)",
        3 => "Incorrect data supplied(3)",
        4 => "Command Queue full(4)",
        5 => "Device not present(5)",
        6 => "No response from device(6)",
        7 => "Sensor Error(7)",
        8 => "Sensor not active(8)",
        9 => "Incorrect command(9)",
        10 => "Address Conflict(10)",
        _ => "Unknown error code",
    }
}

/// Description of a forwarded inverter status code.
pub fn status_text(code: u16) -> &'static str {
    match code {
        // class 100, usually temporary
        102 => "AC Voltage too high",
        103 => "AC Voltage too low",
        105 => "AC frequency too high",
        106 => "AC frequency too low",
        107 => "NO AC Grid detected",
        108 => "Islanding detected",
        112 => "RMCU: Fault current in inverter",
        // class 300, feed-in interrupted
        301 => "Overcurrent AC",
        302 => "Overcurrent DC",
        303 => "Overtemperature DC side",
        304 => "Overtemperature internally",
        305 => "No power transfer to grid possible",
        306 => "Power too low",
        307 => "DC too low",
        308 => "Intermediate circuit voltage too high",
        309 => "DC input voltage too high",
        // class 400, likely hardware
        401 => "No communication with power stage",
        406 | 407 => "Error in temperature sensor",
        408 => "Direct current feed-in",
        412 => "Fixed voltage mode - out of range",
        416 => "No communication between power stage and control unit",
        425 => "Communication with power stage set not possible",
        426 => "Intermediate circuit charging takes too long",
        427 => "Power stage inoperative for too long",
        428 => "Timeout error during connection",
        429 => "Timeout error when disconneting",
        431 => "Power stage software being updated",
        432 => "Internal database error during power st allocation",
        433 => "No dynamic indentification can be assigned to power stage",
        436 => "Incorrect error information from power stage",
        437 => "General troubleshooting in power stage",
        438 => "Incorrect error information from power stage",
        442 => "Power stage set not detected",
        443 => "Energy transfer not possible",
        445 => "Invalid power stage set configuration",
        447 => "Solar module ground insulation error",
        450 => "Error in Guard Control",
        451 => "Guard Control memory faulty",
        452 => "Communication between Guard and DSP interrupted",
        453 => "Error in grid voltage recorded by Guard Control",
        454 => "Error in grid frequency recorded by Guard Control",
        456 => "Error in islanding check by Guard Control",
        457 => "Grid relay defective",
        458 => "DPS and Guard Control measure different RMCU values",
        459 => "Measurement signal recording not possible for insulation test",
        460 => "Reference source for DPS is outside tolerance",
        461 => "Error in DSP memory",
        462 => "Error in DC-feed monitoring routine",
        463 => "AC polarity inverter",
        474 => "RMCU sensor is defective",
        475 => "Error in safety relay",
        476 => "Internal component defective",
        // class 500, limited feed-in
        509 => "No feed-in in last 24 hours - snow on panels?",
        515 => "No communication with string monitor",
        516 => "No communication with memory unit",
        517 => "Power derating due to excessive temperature",
        518 => "Internal DSP malfunction",
        _ => "(No message available)",
    }
}
