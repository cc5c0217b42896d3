//! The fixed set of built-in import paths.
//!
//! Used only to classify an import path as standard or external when
//! choosing its placement group. Membership has no other runtime meaning.

/// Built-in import paths, sorted ascending for binary search.
pub const STANDARD_PATHS: &[&str] = &[
    "archive/tar",
    "archive/zip",
    "bufio",
    "bytes",
    "compress/flate",
    "compress/gzip",
    "compress/zlib",
    "container/heap",
    "container/list",
    "container/ring",
    "context",
    "crypto",
    "crypto/aes",
    "crypto/cipher",
    "crypto/hmac",
    "crypto/md5",
    "crypto/rand",
    "crypto/rsa",
    "crypto/sha1",
    "crypto/sha256",
    "crypto/tls",
    "crypto/x509",
    "database/sql",
    "encoding/base64",
    "encoding/binary",
    "encoding/csv",
    "encoding/hex",
    "encoding/json",
    "encoding/xml",
    "errors",
    "expvar",
    "flag",
    "fmt",
    "hash",
    "hash/crc32",
    "hash/fnv",
    "html",
    "html/template",
    "image",
    "io",
    "io/ioutil",
    "log",
    "math",
    "math/big",
    "math/cmplx",
    "math/rand",
    "mime",
    "mime/multipart",
    "net",
    "net/http",
    "net/http/httptest",
    "net/mail",
    "net/rpc",
    "net/smtp",
    "net/textproto",
    "net/url",
    "os",
    "os/exec",
    "os/signal",
    "os/user",
    "path",
    "path/filepath",
    "reflect",
    "regexp",
    "runtime",
    "sort",
    "strconv",
    "strings",
    "sync",
    "sync/atomic",
    "syscall",
    "testing",
    "text/scanner",
    "text/template",
    "time",
    "unicode",
    "unicode/utf16",
    "unicode/utf8",
];

/// True when `path` names a built-in package.
pub fn is_standard_path(path: &str) -> bool {
    STANDARD_PATHS.binary_search(&path).is_ok()
}
