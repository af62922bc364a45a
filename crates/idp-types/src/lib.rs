pub mod criteria;
pub mod error;
pub mod facts;
pub mod migration;
pub mod record;
pub mod request;

pub use criteria::{Criteria, ListField, OrderBy, Pagination, ScalarField};
pub use error::{Code, ErrorCode, ErrorType};
pub use facts::{ArticleTitle, Author, DocumentFacts, DocumentFactsInput, DoiWithLang, FactsError, Issn, IssnType, RawArticleTitle, RawAuthor, RawDoiWithLang, RawIssn};
pub use migration::{Migration, MigrationStatus, PullSource};
pub use record::DocumentRecord;
pub use request::{Request, RequestStatus};
