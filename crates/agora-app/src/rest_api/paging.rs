use crate::error::{ApiError, ApiResult};
use agora_dal::{Batch, ListingParams, Order};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Common listing query: `?page=2&page_size=20&ordering=-title&search=dune`
#[derive(Debug, Clone, Default, Validate, Deserialize)]
pub struct Paging {
    #[garde(range(min = 1))]
    page: Option<u32>,
    #[garde(range(min = 1, max = 100))]
    page_size: Option<u32>,
    #[garde(length(max = 255))]
    #[serde(alias = "sort")]
    ordering: Option<String>,
    #[garde(length(max = 255))]
    search: Option<String>,
}

fn parse_order(name: &str) -> ApiResult<Order> {
    let (field_name, descending) = match name.trim() {
        "" => return Err(ApiError::InvalidQuery("Empty ordering name".to_string())),
        name if name.len() > 100 => {
            return Err(ApiError::InvalidQuery("Ordering name too long".to_string()))
        }
        name if name.starts_with('+') => (&name[1..], false),
        name if name.starts_with('-') => (&name[1..], true),
        name => (name, false),
    };

    Ok(if descending {
        Order::Desc(field_name.to_string())
    } else {
        Order::Asc(field_name.to_string())
    })
}

impl Paging {
    pub fn into_listing_params(self, default_page_size: u32) -> ApiResult<ListingParams> {
        let page = i64::from(self.page.unwrap_or(1).max(1));
        let page_size = i64::from(self.page_size(default_page_size));
        let order = self
            .ordering
            .map(|orderings| {
                orderings
                    .split(',')
                    .map(parse_order)
                    .collect::<ApiResult<Vec<_>>>()
            })
            .transpose()?;

        Ok(ListingParams {
            offset: (page - 1) * page_size,
            limit: page_size,
            order,
            search: self.search,
        })
    }

    pub fn page_size(&self, default_page_size: u32) -> u32 {
        self.page_size.unwrap_or(default_page_size).max(1)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total: u64,
    pub rows: Vec<T>,
}

impl<T> Page<T>
where
    T: Serialize,
{
    pub fn from_batch(batch: Batch<T>, page_size: u32) -> Self {
        let size = u64::from(page_size.max(1));
        let offset = u64::try_from(batch.offset).unwrap_or_default();
        Self {
            page: u32::try_from(offset / size + 1).unwrap_or(u32::MAX),
            page_size,
            total_pages: u32::try_from(batch.total.div_ceil(size)).unwrap_or(u32::MAX),
            total: batch.total,
            rows: batch.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_params() {
        let paging = Paging {
            page: Some(3),
            page_size: Some(20),
            ordering: Some("-publication_year, +title,author_name".to_string()),
            search: Some("dune".to_string()),
        };
        let params = paging.into_listing_params(10).unwrap();
        assert_eq!(params.offset, 40);
        assert_eq!(params.limit, 20);
        assert_eq!(params.search.as_deref(), Some("dune"));
        let order: Vec<String> = params
            .order
            .unwrap()
            .iter()
            .map(|o| o.to_string())
            .collect();
        assert_eq!(order, ["publication_year DESC", "title", "author_name"]);
    }

    #[test]
    fn test_defaults_and_errors() {
        let params = Paging::default().into_listing_params(10).unwrap();
        assert_eq!(params.offset, 0);
        assert_eq!(params.limit, 10);
        assert!(params.order.is_none());

        let paging = Paging {
            ordering: Some("title,".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            paging.into_listing_params(10),
            Err(ApiError::InvalidQuery(_))
        ));

        let paging = Paging {
            page_size: Some(1000),
            ..Default::default()
        };
        assert!(paging.validate().is_err());
    }

    #[test]
    fn test_page_from_batch() {
        let batch = Batch {
            offset: 20,
            limit: 10,
            rows: vec![1, 2, 3],
            total: 23,
        };
        let page = Page::from_batch(batch, 10);
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total, 23);
        assert_eq!(page.rows.len(), 3);
    }
}
