/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Canonical structured field keys and value-format helpers.

use crate::descriptor::keys;
use crate::invocation::Invocation;

pub const NONE: &str = "none";
pub const RESOURCE_SERVER: &str = "server";
pub const RESOURCE_SHARED_CLIENT: &str = "shared_client";
pub const RESOURCE_GHOST_CLIENT: &str = "ghost_client";
pub const RESOURCE_INVOKER: &str = "invoker";

/// Compact `path:version@group` rendering of the routing attachments of a call.
pub fn format_call_target(invocation: &Invocation) -> String {
    format!(
        "{}:{}@{}",
        invocation.attachment(keys::PATH).unwrap_or(NONE),
        invocation.attachment(keys::VERSION).unwrap_or(NONE),
        invocation.attachment(keys::GROUP).unwrap_or(NONE),
    )
}

#[cfg(test)]
mod tests {
    use super::format_call_target;
    use crate::descriptor::keys;
    use crate::invocation::Invocation;

    #[test]
    fn format_call_target_marks_missing_segments() {
        let invocation = Invocation::new("m", vec![]).with_attachment(keys::PATH, "com.x.Foo");

        assert_eq!(format_call_target(&invocation), "com.x.Foo:none@none");
    }

    #[test]
    fn format_call_target_keeps_present_segments() {
        let invocation = Invocation::new("m", vec![])
            .with_attachment(keys::PATH, "com.x.Foo")
            .with_attachment(keys::VERSION, "1.0.0")
            .with_attachment(keys::GROUP, "g");

        assert_eq!(format_call_target(&invocation), "com.x.Foo:1.0.0@g");
    }
}
