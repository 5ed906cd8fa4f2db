use crate::Version;
use std::sync::OnceLock;

const V2: &[u8] = b"optionsgetheadpostputdeletetraceacceptaccept-charsetaccept-encodingaccept-\
languageauthorizationexpectfromhostif-modified-sinceif-matchif-none-matchi\
f-rangeif-unmodifiedsincemax-forwardsproxy-authorizationrangerefererteuser\
-agent10010120020120220320420520630030130230330430530630740040140240340440\
5406407408409410411412413414415416417500501502503504505accept-rangesageeta\
glocationproxy-authenticatepublicretry-afterservervarywarningwww-authentic\
ateallowcontent-basecontent-encodingcache-controlconnectiondatetrailertran\
sfer-encodingupgradeviawarningcontent-languagecontent-lengthcontent-locati\
oncontent-md5content-rangecontent-typeetagexpireslast-modifiedset-cookieMo\
ndayTuesdayWednesdayThursdayFridaySaturdaySundayJanFebMarAprMayJunJulAugSe\
pOctNovDecchunkedtext/htmlimage/pngimage/jpgimage/gifapplication/xmlapplic\
ation/xhtmltext/plainpublicmax-agecharset=iso-8859-1utf-8gzipdeflateHTTP/1\
.1statusversionurl\0";

/// Words the v3 dictionary stores with a four byte length prefix.
const V3_WORDS: &[&str] = &[
    "options",
    "head",
    "post",
    "put",
    "delete",
    "trace",
    "accept",
    "accept-charset",
    "accept-encoding",
    "accept-language",
    "accept-ranges",
    "age",
    "allow",
    "authorization",
    "cache-control",
    "connection",
    "content-base",
    "content-encoding",
    "content-language",
    "content-length",
    "content-location",
    "content-md5",
    "content-range",
    "content-type",
    "date",
    "etag",
    "expect",
    "expires",
    "from",
    "host",
    "if-match",
    "if-modified-since",
    "if-none-match",
    "if-range",
    "if-unmodified-since",
    "last-modified",
    "location",
    "max-forwards",
    "pragma",
    "proxy-authenticate",
    "proxy-authorization",
    "range",
    "referer",
    "retry-after",
    "server",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    "vary",
    "via",
    "warning",
    "www-authenticate",
    "method",
    "get",
    "status",
    "200 OK",
    "version",
    "HTTP/1.1",
    "url",
    "public",
    "set-cookie",
    "keep-alive",
    "origin",
];

const V3_TAIL: &str = "100101201202205206300302303304305306307402405406407408409410\
411412413414415416417502504505203 Non-Authoritative Information204 No Content\
301 Moved Permanently400 Bad Request401 Unauthorized403 Forbidden404 Not Found\
500 Internal Server Error501 Not Implemented503 Service UnavailableJan Feb Mar \
Apr May Jun Jul Aug Sept Oct Nov Dec 00:00:00 Mon, Tue, Wed, Thu, Fri, Sat, Sun, \
GMTchunked,text/html,image/png,image/jpg,image/gif,application/xml,application/\
xhtml+xml,text/plain,text/javascript,publicprivatemax-age=gzip,deflate,sdchcharset\
=utf-8charset=iso-8859-1,utf-,*,enq=0.";

/// Preset zlib dictionary shared with the peer for header blocks.
pub(crate) fn for_version(version: Version) -> &'static [u8] {
    static V3: OnceLock<Vec<u8>> = OnceLock::new();
    match version {
        Version::V2 => V2,
        Version::V3 => V3.get_or_init(|| {
            let mut dict = Vec::with_capacity(1500);
            for word in V3_WORDS {
                dict.extend((word.len() as u32).to_be_bytes());
                dict.extend(word.as_bytes());
            }
            dict.extend(V3_TAIL.as_bytes());
            dict
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dictionaries_differ_per_version() {
        assert_ne!(for_version(Version::V2), for_version(Version::V3));
        assert_eq!(for_version(Version::V2).last(), Some(&0));
    }

    #[test]
    fn v3_words_are_length_prefixed() {
        let dict = for_version(Version::V3);
        assert_eq!(&dict[..11], b"\x00\x00\x00\x07options");
        assert!(dict.ends_with(b"enq=0."));
    }
}
