use dns::{Flags, Message, Opcode, RecordType, ResourceRecord, ResponseCode, CLASS_IN};
use std::net::Ipv4Addr;

/// Whether the cache can answer this query: a standard query with a single
/// IN A question.
pub fn is_cacheable(query: &Message) -> bool {
    if query.flags.opcode != Opcode::Query || query.questions.len() != 1 {
        return false;
    }

    let question = &query.questions[0];
    question.qtype == RecordType::A && question.qclass == CLASS_IN
}

/// The response to `query` built from cached addresses, one A record per
/// address, named as the question was asked.
pub fn cached_answer(query: &Message, addresses: &[Ipv4Addr], ttl: i32) -> Message {
    let answers = match query.first_question() {
        Some(question) => addresses
            .iter()
            .map(|address| ResourceRecord::a(question.name.clone(), ttl, *address))
            .collect(),
        None => vec![],
    };

    Message {
        id: query.id,
        flags: Flags {
            is_response: true,
            opcode: query.flags.opcode,
            authoritative: false,
            truncated: false,
            recursion_desired: query.flags.recursion_desired,
            recursion_available: true,
            z: 0,
            response_code: ResponseCode::NoError,
        },
        questions: query.questions.clone(),
        answers,
        authority: vec![],
        additional: vec![],
    }
}
