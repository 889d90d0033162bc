// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::TransportError;
use crate::transport::Transport;

pub const FALLBACK_STATUS: u16 = 500;
pub const FALLBACK_CONTENT_TYPE: &str = "text/html; charset=iso-8859-1";
pub const FALLBACK_BODY: &str = "<!DOCTYPE HTML PUBLIC \"-//IETF//DTD HTML 2.0//EN\">\n\
<html><head>\n\
<title>500 Internal Error</title>\n\
</head><body>\n\
<h1>Internal Error</h1>\n\
<p>The server encountered an unexpected condition which\n\
prevented it from fulfilling the request.</p>\n\
</body></html>\n";

/// Write the fixed 500 response. Only valid while no headers have gone out.
pub(crate) fn write_fallback(transport: &dyn Transport) -> Result<(), TransportError> {
    let headers = [
        ("Content-Type".to_string(), FALLBACK_CONTENT_TYPE.to_string()),
        ("Content-Length".to_string(), FALLBACK_BODY.len().to_string()),
    ];
    transport.write_headers(FALLBACK_STATUS, &headers)?;
    transport.write_body(FALLBACK_BODY.as_bytes())
}
