//! Wire messages and the line codec.
//!
//! Messages travel as newline-terminated, colon-delimited text lines, the
//! format the FIFO transport carries natively. Decoding is a tagged-union
//! parse with explicit validation: wrong field counts, non-numeric hours or
//! sizes, and reserved characters in names all yield a [`ProtocolError`]
//! that callers log and drop - a malformed line never reaches the
//! controller and never partially mutates state.

use serde::Serialize;

use crate::admission::{Decision, DenialReason};
use crate::config::RESERVATION_HOURS;
use crate::error::ProtocolError;

/// Longest inbound line the decoder will echo back in diagnostics.
const DIAGNOSTIC_LINE_MAX: usize = 120;

/// Messages from agents to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// Join the simulation.
    Register {
        /// Agent id, unique among currently-registered agents.
        agent: String,
        /// Address of the agent's reply channel (a pipe path for the FIFO
        /// transport, an arbitrary token for in-memory channels).
        reply_to: String,
    },
    /// Ask for a reservation.
    Request {
        /// Requesting agent id.
        agent: String,
        /// Family the block is for.
        family: String,
        /// Requested start hour.
        hour: u8,
        /// People in the party.
        party_size: u32,
    },
    /// The agent is leaving.
    Close {
        /// Departing agent id.
        agent: String,
    },
}

/// Messages from the controller to one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// Current simulated hour; sent on registration and on every tick.
    Time {
        /// The simulated hour just entered.
        hour: u8,
    },
    /// Decision for one reservation request.
    Response {
        /// Family the request was for.
        family: String,
        /// The admission decision.
        decision: Decision,
    },
    /// Simulation finished; the agent should stop.
    End,
}

fn valid_name(value: &str) -> bool {
    !value.is_empty() && !value.contains(':') && !value.contains('\n')
}

fn name_field(value: &str, field: &'static str) -> Result<String, ProtocolError> {
    let value = value.trim();
    if valid_name(value) {
        Ok(value.to_string())
    } else {
        Err(ProtocolError::InvalidName { field })
    }
}

fn number_field<T: std::str::FromStr>(
    value: &str,
    field: &'static str,
) -> Result<T, ProtocolError> {
    value.trim().parse().map_err(|_| ProtocolError::InvalidNumber {
        field,
        value: value.trim().to_string(),
    })
}

fn truncated(line: &str) -> String {
    line.trim().chars().take(DIAGNOSTIC_LINE_MAX).collect()
}

fn expect_fields(
    tag: &'static str,
    fields: &[&str],
    expected: usize,
) -> Result<(), ProtocolError> {
    if fields.len() == expected {
        Ok(())
    } else {
        Err(ProtocolError::FieldCount {
            tag,
            expected,
            actual: fields.len(),
        })
    }
}

impl Inbound {
    /// Decodes one inbound line.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] describing the first malformation: an
    /// unknown tag, a wrong field count, a non-numeric hour or party size
    /// (a zero party size counts as malformed), or a name containing a
    /// reserved character.
    pub fn decode_line(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let (tag, rest) = line.split_once(':').unwrap_or((line, ""));
        match tag {
            "REGISTER" => {
                let fields: Vec<&str> = rest.split(':').collect();
                expect_fields("REGISTER", &fields, 2)?;
                Ok(Self::Register {
                    agent: name_field(fields[0], "agent")?,
                    reply_to: name_field(fields[1], "reply_to")?,
                })
            }
            "REQUEST" => {
                let fields: Vec<&str> = rest.split(':').collect();
                expect_fields("REQUEST", &fields, 4)?;
                let party_size: u32 = number_field(fields[3], "party_size")?;
                if party_size == 0 {
                    return Err(ProtocolError::InvalidNumber {
                        field: "party_size",
                        value: fields[3].trim().to_string(),
                    });
                }
                Ok(Self::Request {
                    agent: name_field(fields[0], "agent")?,
                    family: name_field(fields[1], "family")?,
                    hour: number_field(fields[2], "hour")?,
                    party_size,
                })
            }
            "CLOSE" => {
                let fields: Vec<&str> = rest.split(':').collect();
                expect_fields("CLOSE", &fields, 1)?;
                Ok(Self::Close {
                    agent: name_field(fields[0], "agent")?,
                })
            }
            _ => Err(ProtocolError::UnknownTag {
                line: truncated(line),
            }),
        }
    }

    /// Encodes the message as one newline-terminated line.
    #[must_use]
    pub fn encode_line(&self) -> String {
        match self {
            Self::Register { agent, reply_to } => format!("REGISTER:{agent}:{reply_to}\n"),
            Self::Request {
                agent,
                family,
                hour,
                party_size,
            } => format!("REQUEST:{agent}:{family}:{hour}:{party_size}\n"),
            Self::Close { agent } => format!("CLOSE:{agent}\n"),
        }
    }
}

const fn reason_tag(reason: DenialReason) -> &'static str {
    match reason {
        DenialReason::OutOfRange => "OUT_OF_RANGE",
        DenialReason::OverCapacity => "OVER_CAPACITY",
        DenialReason::Late => "LATE",
        DenialReason::NoCapacity => "NO_CAPACITY",
    }
}

fn parse_reason(tag: &str) -> Result<DenialReason, ProtocolError> {
    match tag {
        "OUT_OF_RANGE" => Ok(DenialReason::OutOfRange),
        "OVER_CAPACITY" => Ok(DenialReason::OverCapacity),
        "LATE" => Ok(DenialReason::Late),
        "NO_CAPACITY" => Ok(DenialReason::NoCapacity),
        _ => Err(ProtocolError::UnknownTag {
            line: truncated(tag),
        }),
    }
}

impl Outbound {
    /// Decodes one controller-to-agent line.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] on an unknown tag, wrong field count, or
    /// unparseable hour.
    pub fn decode_line(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        if line == "END" {
            return Ok(Self::End);
        }
        let (tag, rest) = line.split_once(':').unwrap_or((line, ""));
        match tag {
            "TIME" => Ok(Self::Time {
                hour: number_field(rest, "hour")?,
            }),
            "RESPONSE" => Self::decode_response(rest),
            _ => Err(ProtocolError::UnknownTag {
                line: truncated(line),
            }),
        }
    }

    fn decode_response(rest: &str) -> Result<Self, ProtocolError> {
        let fields: Vec<&str> = rest.split(':').collect();
        match fields.first().copied() {
            Some("CONFIRMED") | Some("REPROGRAMMED") => {
                expect_fields("RESPONSE", &fields, 4)?;
                let family = name_field(fields[1], "family")?;
                let start_hour: u8 = number_field(fields[2], "hour1")?;
                let _: u8 = number_field(fields[3], "hour2")?;
                let decision = if fields[0] == "CONFIRMED" {
                    Decision::Confirmed { start_hour }
                } else {
                    Decision::Reprogrammed { start_hour }
                };
                Ok(Self::Response { family, decision })
            }
            Some("DENIED") => {
                expect_fields("RESPONSE", &fields, 3)?;
                let reason = parse_reason(fields[1])?;
                let family = name_field(fields[2], "family")?;
                Ok(Self::Response {
                    family,
                    decision: Decision::Denied { reason },
                })
            }
            _ => Err(ProtocolError::UnknownTag {
                line: truncated(rest),
            }),
        }
    }

    /// Encodes the message as one newline-terminated line.
    ///
    /// Booked outcomes carry both covered hours so agents need not know the
    /// block duration.
    #[must_use]
    pub fn encode_line(&self) -> String {
        match self {
            Self::Time { hour } => format!("TIME:{hour}\n"),
            Self::Response { family, decision } => match decision {
                Decision::Confirmed { start_hour } => format!(
                    "RESPONSE:CONFIRMED:{family}:{start_hour}:{}\n",
                    start_hour + RESERVATION_HOURS - 1
                ),
                Decision::Reprogrammed { start_hour } => format!(
                    "RESPONSE:REPROGRAMMED:{family}:{start_hour}:{}\n",
                    start_hour + RESERVATION_HOURS - 1
                ),
                Decision::Denied { reason } => {
                    format!("RESPONSE:DENIED:{}:{family}\n", reason_tag(*reason))
                }
            },
            Self::End => "END\n".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_register() {
        let msg = Inbound::decode_line("REGISTER:a1:/tmp/reply_a1\n").expect("valid");
        assert_eq!(
            msg,
            Inbound::Register {
                agent: "a1".to_string(),
                reply_to: "/tmp/reply_a1".to_string(),
            }
        );
    }

    #[test]
    fn decodes_request_with_surrounding_whitespace() {
        let msg = Inbound::decode_line("REQUEST: a1 : Perez : 9 : 5 \n").expect("valid");
        assert_eq!(
            msg,
            Inbound::Request {
                agent: "a1".to_string(),
                family: "Perez".to_string(),
                hour: 9,
                party_size: 5,
            }
        );
    }

    #[test]
    fn decodes_close() {
        let msg = Inbound::decode_line("CLOSE:a1").expect("valid");
        assert_eq!(
            msg,
            Inbound::Close {
                agent: "a1".to_string()
            }
        );
    }

    #[test]
    fn rejects_unknown_tag() {
        let err = Inbound::decode_line("HELLO:a1:/tmp/x").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownTag { .. }));
    }

    #[test]
    fn rejects_wrong_field_count() {
        let err = Inbound::decode_line("REQUEST:a1:Perez:9").unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FieldCount {
                tag: "REQUEST",
                expected: 4,
                actual: 3,
            }
        );
    }

    #[test]
    fn rejects_non_numeric_and_zero_party() {
        assert!(matches!(
            Inbound::decode_line("REQUEST:a1:Perez:nine:5").unwrap_err(),
            ProtocolError::InvalidNumber { field: "hour", .. }
        ));
        assert!(matches!(
            Inbound::decode_line("REQUEST:a1:Perez:9:0").unwrap_err(),
            ProtocolError::InvalidNumber {
                field: "party_size",
                ..
            }
        ));
    }

    #[test]
    fn rejects_empty_names() {
        assert!(matches!(
            Inbound::decode_line("CLOSE:  ").unwrap_err(),
            ProtocolError::InvalidName { field: "agent" }
        ));
    }

    #[test]
    fn inbound_round_trips_through_lines() {
        let messages = [
            Inbound::Register {
                agent: "a1".to_string(),
                reply_to: "/tmp/r".to_string(),
            },
            Inbound::Request {
                agent: "a1".to_string(),
                family: "Perez".to_string(),
                hour: 9,
                party_size: 5,
            },
            Inbound::Close {
                agent: "a1".to_string(),
            },
        ];
        for msg in messages {
            assert_eq!(Inbound::decode_line(&msg.encode_line()).expect("valid"), msg);
        }
    }

    #[test]
    fn response_lines_carry_both_covered_hours() {
        let line = Outbound::Response {
            family: "Perez".to_string(),
            decision: Decision::Confirmed { start_hour: 9 },
        }
        .encode_line();
        assert_eq!(line, "RESPONSE:CONFIRMED:Perez:9:10\n");

        let line = Outbound::Response {
            family: "Perez".to_string(),
            decision: Decision::Denied {
                reason: DenialReason::OverCapacity,
            },
        }
        .encode_line();
        assert_eq!(line, "RESPONSE:DENIED:OVER_CAPACITY:Perez\n");
    }

    #[test]
    fn outbound_round_trips_through_lines() {
        let messages = [
            Outbound::Time { hour: 12 },
            Outbound::Response {
                family: "Perez".to_string(),
                decision: Decision::Reprogrammed { start_hour: 11 },
            },
            Outbound::Response {
                family: "Lopez".to_string(),
                decision: Decision::Denied {
                    reason: DenialReason::Late,
                },
            },
            Outbound::End,
        ];
        for msg in messages {
            assert_eq!(
                Outbound::decode_line(&msg.encode_line()).expect("valid"),
                msg
            );
        }
    }

    #[test]
    fn diagnostics_truncate_oversized_lines() {
        let line = format!("GARBAGE:{}", "x".repeat(500));
        let ProtocolError::UnknownTag { line } = Inbound::decode_line(&line).unwrap_err() else {
            panic!("expected UnknownTag");
        };
        assert!(line.chars().count() <= 120);
    }
}
